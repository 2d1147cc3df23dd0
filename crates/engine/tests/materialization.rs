//! End-to-end materialization tests: source-of-truth lifecycle events
//! turning into ghosts, auto-generated nodes, and layout resets.

use assert_matches::assert_matches;
use sqlx::PgPool;

use ideaflow_core::graph::{ContainerState, Position};
use ideaflow_core::intent::{CanvasIntent, SourceEvent};
use ideaflow_core::layout::{origin_spawn_position, SourceRef};
use ideaflow_db::models::workspace::CreateWorkspace;
use ideaflow_db::repositories::{CanvasLockRepo, GraphRepo, WorkspaceRepo};
use ideaflow_engine::context::ExecutionContext;
use ideaflow_engine::orchestrator::{handle_intent, handle_source_event};
use ideaflow_events::EventBus;

const ACTOR: i64 = 42;

async fn new_workspace(pool: &PgPool) -> i64 {
    WorkspaceRepo::create(
        pool,
        &CreateWorkspace {
            name: "canvas".into(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn lock(pool: &PgPool, workspace_id: i64) {
    CanvasLockRepo::acquire(pool, workspace_id, ACTOR, 600)
        .await
        .unwrap()
        .expect("lock should be free");
}

fn ctx(workspace_id: i64) -> ExecutionContext {
    ExecutionContext {
        workspace_id,
        actor_id: ACTOR,
    }
}

fn created(entity_type: &str, entity_id: i64, title: &str, parent: Option<(&str, i64)>) -> SourceEvent {
    SourceEvent::EntityCreated {
        entity: SourceRef::new(entity_type, entity_id),
        title: title.into(),
        parent: parent.map(|(t, id)| SourceRef::new(t, id)),
    }
}

// ---------------------------------------------------------------------------
// Scenario A: intact layout, child materializes nested with one auto node
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn child_entity_materializes_nested_with_auto_node(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    let outcome =
        handle_source_event(&pool, &bus, &created("project", 100, "Project", None), &ctx(ws)).await;
    assert!(outcome.is_success());

    let outcome = handle_source_event(
        &pool,
        &bus,
        &created("task", 200, "Task", Some(("project", 100))),
        &ctx(ws),
    )
    .await;
    assert!(outcome.is_success());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert_eq!(snapshot.containers.len(), 2);

    let parent = snapshot.container_mirroring("project", 100).unwrap();
    let child = snapshot.container_mirroring("task", 200).unwrap();
    assert_eq!(child.state, ContainerState::Ghost);
    assert!(child.is_auto_generated);
    assert_eq!(child.parent_container_id, Some(parent.id));
    assert_ne!(child.position, parent.position);

    // Exactly one auto-generated composition node between them.
    assert_eq!(snapshot.nodes.len(), 1);
    let node = snapshot.nodes.values().next().unwrap();
    assert!(node.source_generated);
    let from = snapshot.container_of_port(node.from_port_id).unwrap();
    let to = snapshot.container_of_port(node.to_port_id).unwrap();
    assert_eq!(from.id, parent.id);
    assert_eq!(to.id, child.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn redelivered_creation_is_idempotent(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    let event = created("project", 100, "Project", None);
    handle_source_event(&pool, &bus, &event, &ctx(ws)).await;
    let outcome = handle_source_event(&pool, &bus, &event, &ctx(ws)).await;
    assert!(outcome.planning.is_ok());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert_eq!(snapshot.containers.len(), 1);
}

// ---------------------------------------------------------------------------
// Scenario B: after manual control, ghosts spawn at the origin offset
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn broken_layout_spawns_at_origin_without_auto_node(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    handle_source_event(&pool, &bus, &created("project", 100, "Project", None), &ctx(ws)).await;

    // User drags the mirrored container: layout_intact flips permanently.
    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    let container_id = snapshot.container_mirroring("project", 100).unwrap().id;
    let outcome = handle_intent(
        &pool,
        &bus,
        &CanvasIntent::MoveContainer {
            container_id,
            to: Position { x: 900.0, y: 900.0 },
        },
        &ctx(ws),
    )
    .await;
    assert!(outcome.is_success());

    let outcome = handle_source_event(
        &pool,
        &bus,
        &created("task", 200, "Task", Some(("project", 100))),
        &ctx(ws),
    )
    .await;
    assert!(outcome.is_success());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert!(!snapshot.workspace.layout_intact);

    let ghost = snapshot.container_mirroring("task", 200).unwrap();
    assert_eq!(ghost.position, origin_spawn_position());
    assert_eq!(ghost.parent_container_id, None);
    assert!(snapshot.nodes.is_empty(), "no auto node once layout is broken");
}

// ---------------------------------------------------------------------------
// Scenario C: activation through the full stack
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn ghost_activates_once_and_only_once(pool: PgPool) {
    use ideaflow_core::error::CoreError;

    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    handle_source_event(&pool, &bus, &created("project", 100, "Project", None), &ctx(ws)).await;
    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    let container_id = snapshot.container_mirroring("project", 100).unwrap().id;

    let activate = CanvasIntent::ActivateContainer {
        container_id,
        title: "My project notes".into(),
        body: String::new(),
    };
    let outcome = handle_intent(&pool, &bus, &activate, &ctx(ws)).await;
    assert!(outcome.is_success());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert_eq!(
        snapshot.container(container_id).unwrap().state,
        ContainerState::Active
    );

    let outcome = handle_intent(&pool, &bus, &activate, &ctx(ws)).await;
    assert_matches!(
        outcome.planning,
        Err(CoreError::Forbidden(msg)) if msg.contains("already active")
    );
    assert!(outcome.execution.is_none());
}

// ---------------------------------------------------------------------------
// Entity updates and deletions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_renames_ghost_but_not_activated_container(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    handle_source_event(&pool, &bus, &created("project", 100, "Old name", None), &ctx(ws)).await;

    let update = SourceEvent::EntityUpdated {
        entity: SourceRef::new("project", 100),
        title: "New name".into(),
        parent: None,
    };
    handle_source_event(&pool, &bus, &update, &ctx(ws)).await;

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    let container = snapshot.container_mirroring("project", 100).unwrap();
    assert_eq!(container.title, "New name");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deletion_breaks_reference_but_keeps_container(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    handle_source_event(&pool, &bus, &created("project", 100, "Project", None), &ctx(ws)).await;

    let outcome = handle_source_event(
        &pool,
        &bus,
        &SourceEvent::EntityDeleted {
            entity: SourceRef::new("project", 100),
        },
        &ctx(ws),
    )
    .await;
    assert!(outcome.is_success());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert_eq!(snapshot.containers.len(), 1, "container survives");
    assert!(snapshot.references.is_empty(), "reference is broken");
}

// ---------------------------------------------------------------------------
// Layout reset
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn reset_restores_default_layout_and_flag(pool: PgPool) {
    let ws = new_workspace(&pool).await;
    lock(&pool, ws).await;
    let bus = EventBus::default();

    handle_source_event(&pool, &bus, &created("project", 100, "Project", None), &ctx(ws)).await;
    handle_source_event(
        &pool,
        &bus,
        &created("task", 200, "Task", Some(("project", 100))),
        &ctx(ws),
    )
    .await;

    // Break the layout: drag the child somewhere else.
    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    let child_id = snapshot.container_mirroring("task", 200).unwrap().id;
    handle_intent(
        &pool,
        &bus,
        &CanvasIntent::MoveContainer {
            container_id: child_id,
            to: Position { x: 777.0, y: 888.0 },
        },
        &ctx(ws),
    )
    .await;

    let outcome = handle_intent(&pool, &bus, &CanvasIntent::ResetLayout, &ctx(ws)).await;
    assert!(outcome.is_success());

    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    assert!(snapshot.workspace.layout_intact);
    assert!(snapshot.workspace.last_layout_reset_at.is_some());

    // The child is re-nested and repositioned deterministically.
    let parent = snapshot.container_mirroring("project", 100).unwrap();
    let child = snapshot.container_mirroring("task", 200).unwrap();
    assert_eq!(child.parent_container_id, Some(parent.id));
    assert_ne!(child.position, Position { x: 777.0, y: 888.0 });

    // Composition node regenerated.
    assert_eq!(
        snapshot
            .nodes
            .values()
            .filter(|n| n.source_generated)
            .count(),
        1
    );

    // Running the reset again yields identical positions (idempotence).
    let first_positions: Vec<(i64, Position)> = snapshot
        .containers
        .values()
        .map(|c| (c.id, c.position))
        .collect();
    let outcome = handle_intent(&pool, &bus, &CanvasIntent::ResetLayout, &ctx(ws)).await;
    assert!(outcome.is_success());
    let snapshot = GraphRepo::load_snapshot(&pool, ws).await.unwrap();
    let second_positions: Vec<(i64, Position)> = snapshot
        .containers
        .values()
        .map(|c| (c.id, c.position))
        .collect();
    assert_eq!(first_positions, second_positions);
}
