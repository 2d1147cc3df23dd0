//! Interaction planning (PRD-24).
//!
//! Translates the closed set of user intents and the closed set of
//! source-of-truth lifecycle events into a [`Plan`]: an ordered list of
//! mutations plus the behavioral events to emit on success. Planning
//! consults validation and layout, performs no I/O, and is a pure function
//! of the [`PlanningContext`] passed in. An invalid intent yields an
//! explicit error, never a partial or best-guess plan.

use crate::error::CoreError;
use crate::graph::{ContainerState, GraphSnapshot};
use crate::intent::{CanvasIntent, SourceEvent};
use crate::layout::{
    self, default_size, next_hierarchical_position, origin_spawn_position, SourceRef,
};
use crate::plan::{EntityRef, Mutation, Plan};
use crate::telemetry::BehavioralEventKind;
use crate::types::{DbId, Timestamp};
use crate::validation;

// ---------------------------------------------------------------------------
// Planning context
// ---------------------------------------------------------------------------

/// The canvas lock as the caller last observed it.
///
/// Execution re-checks the authoritative lock row; carrying the claim here
/// lets planning reject a doomed flow before any work is done.
#[derive(Debug, Clone, PartialEq)]
pub struct LockClaim {
    pub holder_id: DbId,
    pub expires_at: Timestamp,
}

/// Everything planning is allowed to know.
#[derive(Debug, Clone)]
pub struct PlanningContext {
    pub snapshot: GraphSnapshot,
    pub actor_id: DbId,
    /// Evaluation time, supplied by the caller so planning stays pure.
    pub now: Timestamp,
    pub lock: Option<LockClaim>,
}

impl PlanningContext {
    fn require_lock(&self) -> Result<(), CoreError> {
        match &self.lock {
            None => Err(CoreError::LockViolation(format!(
                "no canvas lock held for workspace {}",
                self.snapshot.workspace.id
            ))),
            Some(claim) if claim.holder_id != self.actor_id => Err(CoreError::LockViolation(
                format!("canvas lock is held by user {}", claim.holder_id),
            )),
            Some(claim) if claim.expires_at <= self.now => Err(CoreError::LockViolation(
                "canvas lock has expired".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }

    fn layout_intact(&self) -> bool {
        self.snapshot.workspace.layout_intact
    }
}

// ---------------------------------------------------------------------------
// Intent planning
// ---------------------------------------------------------------------------

/// Translate a user intent into a plan, or an explicit planning error.
pub fn plan_intent(intent: &CanvasIntent, ctx: &PlanningContext) -> Result<Plan, CoreError> {
    ctx.require_lock()?;

    let plan = match intent {
        CanvasIntent::MoveContainer { container_id, to } => {
            require_container(&ctx.snapshot, *container_id)?;
            let mut mutations = vec![Mutation::MoveContainer {
                container: EntityRef::existing(*container_id),
                to: *to,
            }];
            push_layout_break(&mut mutations, ctx);
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!(
                    "Move container {container_id} to ({:.1}, {:.1})",
                    to.x, to.y
                ),
                mutations,
                events: vec![BehavioralEventKind::ContainerMoved],
            }
        }

        CanvasIntent::ResizeContainer { container_id, to } => {
            require_container(&ctx.snapshot, *container_id)?;
            let mut mutations = vec![Mutation::ResizeContainer {
                container: EntityRef::existing(*container_id),
                to: *to,
            }];
            push_layout_break(&mut mutations, ctx);
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!(
                    "Resize container {container_id} to {:.0}x{:.0}",
                    to.width, to.height
                ),
                mutations,
                events: vec![BehavioralEventKind::ContainerResized],
            }
        }

        CanvasIntent::NestContainer {
            container_id,
            parent_id,
        } => {
            require_container(&ctx.snapshot, *container_id)?;
            require_container(&ctx.snapshot, *parent_id)?;
            let mut mutations = vec![Mutation::SetParent {
                container: EntityRef::existing(*container_id),
                parent: Some(EntityRef::existing(*parent_id)),
            }];
            push_layout_break(&mut mutations, ctx);
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!("Nest container {container_id} under {parent_id}"),
                mutations,
                events: vec![BehavioralEventKind::ContainerNested],
            }
        }

        CanvasIntent::UnnestContainer { container_id } => {
            let container = require_container(&ctx.snapshot, *container_id)?;
            if container.parent_container_id.is_none() {
                return Err(CoreError::Forbidden(format!(
                    "container {container_id} is not nested"
                )));
            }
            let mut mutations = vec![Mutation::SetParent {
                container: EntityRef::existing(*container_id),
                parent: None,
            }];
            push_layout_break(&mut mutations, ctx);
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!("Unnest container {container_id}"),
                mutations,
                events: vec![BehavioralEventKind::ContainerUnnested],
            }
        }

        CanvasIntent::ActivateContainer {
            container_id,
            title,
            body,
        } => {
            let container = require_container(&ctx.snapshot, *container_id)?;
            if container.state == ContainerState::Active {
                return Err(CoreError::Forbidden(format!(
                    "container {container_id} is already active"
                )));
            }
            let mut mutations = vec![Mutation::ActivateContainer {
                container: EntityRef::existing(*container_id),
                title: title.clone(),
                body: body.clone(),
            }];
            push_layout_break(&mut mutations, ctx);
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!("Activate container {container_id}"),
                mutations,
                events: vec![BehavioralEventKind::ContainerActivated],
            }
        }

        CanvasIntent::CreateNode {
            from_port_id,
            to_port_id,
        } => {
            // Manual edges never break the default layout.
            let mutations = vec![Mutation::CreateNode {
                slot: 1,
                from_port: EntityRef::existing(*from_port_id),
                to_port: EntityRef::existing(*to_port_id),
                source_generated: false,
            }];
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!("Connect ports {from_port_id} and {to_port_id}"),
                mutations,
                events: vec![BehavioralEventKind::NodeCreated],
            }
        }

        CanvasIntent::DeleteNode { node_id } => {
            let node = ctx
                .snapshot
                .node(*node_id)
                .ok_or(CoreError::NotFound {
                    entity: "Node",
                    id: *node_id,
                })?;
            let mut mutations = vec![Mutation::DeleteNode {
                node: EntityRef::existing(*node_id),
            }];
            // Deleting an auto-generated node is taking manual control.
            if node.source_generated {
                push_layout_break(&mut mutations, ctx);
            }
            Plan {
                workspace_id: ctx.snapshot.workspace.id,
                description: format!("Delete node {node_id}"),
                mutations,
                events: vec![BehavioralEventKind::NodeDeleted],
            }
        }

        CanvasIntent::ResetLayout => plan_reset_layout(ctx),
    };

    validation::validate_plan(&plan, &ctx.snapshot).map_err(CoreError::Validation)?;
    Ok(plan)
}

/// Build the reset-to-default-layout plan.
///
/// Recomputes every mirrored container's position from the stored entity
/// hierarchy, re-nests them, regenerates composition nodes, and restores
/// the `layout_intact` flag.
fn plan_reset_layout(ctx: &PlanningContext) -> Plan {
    let snapshot = &ctx.snapshot;
    let entities = layout::mirrored_hierarchy(snapshot);
    let placed = layout::compute_default_layout(&entities);

    let mut mutations: Vec<Mutation> = Vec::new();

    // Drop existing composition nodes, then any ports left anchoring only
    // them, before regenerating from scratch.
    let auto_nodes: Vec<_> = snapshot
        .nodes
        .values()
        .filter(|n| n.source_generated)
        .collect();
    let mut freed_ports: Vec<DbId> = Vec::new();
    for node in &auto_nodes {
        for port_id in [node.from_port_id, node.to_port_id] {
            let only_auto = snapshot
                .nodes
                .values()
                .filter(|n| n.from_port_id == port_id || n.to_port_id == port_id)
                .all(|n| n.source_generated);
            if only_auto && !freed_ports.contains(&port_id) {
                freed_ports.push(port_id);
            }
        }
        mutations.push(Mutation::DeleteNode {
            node: EntityRef::existing(node.id),
        });
    }
    for port_id in freed_ports {
        mutations.push(Mutation::DeletePort {
            port: EntityRef::existing(port_id),
        });
    }

    let mut slot: u32 = 1;
    for p in &placed {
        let Some(container) =
            snapshot.container_mirroring(&p.entity.entity_type, p.entity.entity_id)
        else {
            continue;
        };
        mutations.push(Mutation::MoveContainer {
            container: EntityRef::existing(container.id),
            to: p.position,
        });

        let parent_container_id = p
            .parent
            .as_ref()
            .and_then(|parent| snapshot.container_mirroring(&parent.entity_type, parent.entity_id))
            .map(|c| c.id);
        mutations.push(Mutation::SetParent {
            container: EntityRef::existing(container.id),
            parent: parent_container_id.map(EntityRef::existing),
        });

        if let Some(parent_id) = parent_container_id {
            let parent_port = next_slot(&mut slot);
            let child_port = next_slot(&mut slot);
            let node_slot = next_slot(&mut slot);
            mutations.push(Mutation::CreatePort {
                slot: parent_port,
                container: EntityRef::existing(parent_id),
            });
            mutations.push(Mutation::CreatePort {
                slot: child_port,
                container: EntityRef::existing(container.id),
            });
            mutations.push(Mutation::CreateNode {
                slot: node_slot,
                from_port: EntityRef::planned(parent_port),
                to_port: EntityRef::planned(child_port),
                source_generated: true,
            });
        }
    }

    // The commit timestamp is filled in by the execution engine.
    mutations.push(Mutation::SetLayoutIntact {
        intact: true,
        reset_at: None,
    });

    Plan {
        workspace_id: snapshot.workspace.id,
        description: format!(
            "Reset workspace {} to the default layout ({} mirrored containers)",
            snapshot.workspace.id,
            placed.len()
        ),
        mutations,
        events: vec![BehavioralEventKind::LayoutReset],
    }
}

// ---------------------------------------------------------------------------
// Source-event planning (materialization)
// ---------------------------------------------------------------------------

/// Translate a source-of-truth lifecycle event into a plan.
///
/// Redelivered or irrelevant events produce an empty plan rather than an
/// error; the integration may replay its feed at any time.
pub fn plan_source_event(event: &SourceEvent, ctx: &PlanningContext) -> Result<Plan, CoreError> {
    ctx.require_lock()?;

    let plan = match event {
        SourceEvent::EntityCreated {
            entity,
            title,
            parent,
        } => plan_entity_created(ctx, entity, title, parent.as_ref()),
        SourceEvent::EntityUpdated {
            entity,
            title,
            parent,
        } => plan_entity_updated(ctx, entity, title, parent.as_ref()),
        SourceEvent::EntityDeleted { entity } => plan_entity_deleted(ctx, entity),
    };

    validation::validate_plan(&plan, &ctx.snapshot).map_err(CoreError::Validation)?;
    Ok(plan)
}

fn plan_entity_created(
    ctx: &PlanningContext,
    entity: &SourceRef,
    title: &str,
    parent: Option<&SourceRef>,
) -> Plan {
    let snapshot = &ctx.snapshot;
    if snapshot
        .container_mirroring(&entity.entity_type, entity.entity_id)
        .is_some()
    {
        return noop_plan(snapshot, format!("{} already mirrored", describe(entity)));
    }

    let mut mutations: Vec<Mutation> = Vec::new();
    let mut slot: u32 = 1;
    let container_slot = next_slot(&mut slot);

    let (position, parent_container_id) = if ctx.layout_intact() {
        let parent_container_id = parent
            .and_then(|p| snapshot.container_mirroring(&p.entity_type, p.entity_id))
            .map(|c| c.id);
        (
            next_hierarchical_position(snapshot, parent_container_id),
            parent_container_id,
        )
    } else {
        (origin_spawn_position(), None)
    };

    mutations.push(Mutation::CreateContainer {
        slot: container_slot,
        title: title.to_string(),
        body: String::new(),
        position,
        size: default_size(),
        state: ContainerState::Ghost,
        parent: parent_container_id.map(EntityRef::existing),
        is_auto_generated: true,
    });

    let reference_slot = next_slot(&mut slot);
    mutations.push(Mutation::CreateReference {
        slot: reference_slot,
        container: EntityRef::planned(container_slot),
        entity_type: entity.entity_type.clone(),
        entity_id: entity.entity_id,
        is_primary: true,
        parent_entity_type: parent.map(|p| p.entity_type.clone()),
        parent_entity_id: parent.map(|p| p.entity_id),
    });

    // Composition edge to the hierarchical parent, only while the default
    // layout still owns placement.
    if let Some(parent_id) = parent_container_id {
        let parent_port = next_slot(&mut slot);
        let child_port = next_slot(&mut slot);
        let node_slot = next_slot(&mut slot);
        mutations.push(Mutation::CreatePort {
            slot: parent_port,
            container: EntityRef::existing(parent_id),
        });
        mutations.push(Mutation::CreatePort {
            slot: child_port,
            container: EntityRef::planned(container_slot),
        });
        mutations.push(Mutation::CreateNode {
            slot: node_slot,
            from_port: EntityRef::planned(parent_port),
            to_port: EntityRef::planned(child_port),
            source_generated: true,
        });
    }

    Plan {
        workspace_id: snapshot.workspace.id,
        description: format!("Materialize ghost for {}", describe(entity)),
        mutations,
        events: vec![BehavioralEventKind::GhostMaterialized],
    }
}

fn plan_entity_updated(
    ctx: &PlanningContext,
    entity: &SourceRef,
    title: &str,
    parent: Option<&SourceRef>,
) -> Plan {
    let snapshot = &ctx.snapshot;
    let Some(container) = snapshot.container_mirroring(&entity.entity_type, entity.entity_id)
    else {
        return noop_plan(snapshot, format!("{} is not mirrored", describe(entity)));
    };
    let Some(reference) = snapshot.primary_reference_of(container.id) else {
        return noop_plan(snapshot, format!("{} has no primary reference", describe(entity)));
    };

    let mut mutations: Vec<Mutation> = Vec::new();

    // Ghosts track the mirrored entity's name; activated containers own
    // their content and are left alone.
    if container.state == ContainerState::Ghost && container.title != title {
        mutations.push(Mutation::SyncGhostContent {
            container: EntityRef::existing(container.id),
            title: title.to_string(),
        });
    }

    let new_parent_type = parent.map(|p| p.entity_type.clone());
    let new_parent_id = parent.map(|p| p.entity_id);
    if reference.parent_entity_type != new_parent_type
        || reference.parent_entity_id != new_parent_id
    {
        mutations.push(Mutation::SetReferenceParent {
            reference: EntityRef::existing(reference.id),
            parent_entity_type: new_parent_type,
            parent_entity_id: new_parent_id,
        });
    }

    if mutations.is_empty() {
        return noop_plan(snapshot, format!("{} mirror unchanged", describe(entity)));
    }

    Plan {
        workspace_id: snapshot.workspace.id,
        description: format!("Sync mirror of {}", describe(entity)),
        mutations,
        events: vec![BehavioralEventKind::GhostSynced],
    }
}

fn plan_entity_deleted(ctx: &PlanningContext, entity: &SourceRef) -> Plan {
    let snapshot = &ctx.snapshot;
    let broken = snapshot.references_to_entity(&entity.entity_type, entity.entity_id);
    if broken.is_empty() {
        return noop_plan(snapshot, format!("{} is not referenced", describe(entity)));
    }

    // Deleting the external entity never deletes containers; it only breaks
    // references. A broken primary hands off to the earliest sibling.
    let mut mutations: Vec<Mutation> = Vec::new();
    for reference in broken {
        if reference.is_primary {
            let successor = snapshot
                .references_of(reference.container_id)
                .into_iter()
                .filter(|r| r.id != reference.id)
                .min_by_key(|r| r.id);
            if let Some(successor) = successor {
                mutations.push(Mutation::SetPrimaryReference {
                    container: EntityRef::existing(reference.container_id),
                    reference: EntityRef::existing(successor.id),
                });
            }
        }
        mutations.push(Mutation::DeleteReference {
            reference: EntityRef::existing(reference.id),
        });
    }

    Plan {
        workspace_id: snapshot.workspace.id,
        description: format!("Break references to deleted {}", describe(entity)),
        mutations,
        events: vec![BehavioralEventKind::ReferenceBroken],
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_container(snapshot: &GraphSnapshot, id: DbId) -> Result<&crate::graph::Container, CoreError> {
    snapshot.container(id).ok_or(CoreError::NotFound {
        entity: "Container",
        id,
    })
}

/// Append the one-way `layout_intact` flip when a user takes manual control.
fn push_layout_break(mutations: &mut Vec<Mutation>, ctx: &PlanningContext) {
    if ctx.layout_intact() {
        mutations.push(Mutation::SetLayoutIntact {
            intact: false,
            reset_at: None,
        });
    }
}

fn noop_plan(snapshot: &GraphSnapshot, description: String) -> Plan {
    Plan {
        workspace_id: snapshot.workspace.id,
        description,
        mutations: Vec::new(),
        events: Vec::new(),
    }
}

fn describe(entity: &SourceRef) -> String {
    format!("{} {}", entity.entity_type, entity.entity_id)
}

fn next_slot(counter: &mut u32) -> u32 {
    let slot = *counter;
    *counter += 1;
    slot
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Container, ContainerReference, NodeEdge, Port, Position, WorkspaceMeta};
    use assert_matches::assert_matches;

    fn workspace(layout_intact: bool) -> WorkspaceMeta {
        WorkspaceMeta {
            id: 1,
            layout_intact,
            last_layout_reset_at: None,
        }
    }

    fn container(id: DbId, state: ContainerState) -> Container {
        Container {
            id,
            workspace_id: 1,
            title: format!("container {id}"),
            body: String::new(),
            position: Position { x: 0.0, y: 0.0 },
            size: default_size(),
            state,
            parent_container_id: None,
            is_auto_generated: false,
        }
    }

    fn context(snapshot: GraphSnapshot) -> PlanningContext {
        let now = chrono::Utc::now();
        PlanningContext {
            snapshot,
            actor_id: 42,
            now,
            lock: Some(LockClaim {
                holder_id: 42,
                expires_at: now + chrono::Duration::minutes(10),
            }),
        }
    }

    fn basic_snapshot(layout_intact: bool) -> GraphSnapshot {
        let mut s = GraphSnapshot::new(workspace(layout_intact));
        s.containers
            .insert(1, container(1, ContainerState::Active));
        s.containers.insert(2, container(2, ContainerState::Ghost));
        s
    }

    // -- Lock gate ----------------------------------------------------------

    #[test]
    fn planning_without_lock_fails() {
        let mut ctx = context(basic_snapshot(true));
        ctx.lock = None;
        let result = plan_intent(
            &CanvasIntent::MoveContainer {
                container_id: 1,
                to: Position { x: 5.0, y: 5.0 },
            },
            &ctx,
        );
        assert_matches!(result, Err(CoreError::LockViolation(_)));
    }

    #[test]
    fn planning_with_foreign_lock_fails() {
        let mut ctx = context(basic_snapshot(true));
        ctx.lock.as_mut().unwrap().holder_id = 7;
        let result = plan_intent(&CanvasIntent::ResetLayout, &ctx);
        assert_matches!(result, Err(CoreError::LockViolation(_)));
    }

    #[test]
    fn planning_with_expired_lock_fails() {
        let mut ctx = context(basic_snapshot(true));
        ctx.lock.as_mut().unwrap().expires_at = ctx.now - chrono::Duration::seconds(1);
        let result = plan_intent(&CanvasIntent::ResetLayout, &ctx);
        assert_matches!(result, Err(CoreError::LockViolation(_)));
    }

    // -- Move / layout flag -------------------------------------------------

    #[test]
    fn move_on_intact_workspace_flips_flag() {
        let ctx = context(basic_snapshot(true));
        let plan = plan_intent(
            &CanvasIntent::MoveContainer {
                container_id: 1,
                to: Position { x: 300.0, y: 10.0 },
            },
            &ctx,
        )
        .unwrap();

        assert_eq!(plan.mutations.len(), 2);
        assert_matches!(
            plan.mutations[1],
            Mutation::SetLayoutIntact { intact: false, .. }
        );
        assert_eq!(plan.events, vec![BehavioralEventKind::ContainerMoved]);
    }

    #[test]
    fn move_on_broken_workspace_does_not_touch_flag() {
        let ctx = context(basic_snapshot(false));
        let plan = plan_intent(
            &CanvasIntent::MoveContainer {
                container_id: 1,
                to: Position { x: 300.0, y: 10.0 },
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(plan.mutations.len(), 1);
    }

    #[test]
    fn move_of_unknown_container_is_not_found() {
        let ctx = context(basic_snapshot(true));
        let result = plan_intent(
            &CanvasIntent::MoveContainer {
                container_id: 99,
                to: Position { x: 0.0, y: 0.0 },
            },
            &ctx,
        );
        assert_matches!(
            result,
            Err(CoreError::NotFound {
                entity: "Container",
                id: 99
            })
        );
    }

    // -- Nesting ------------------------------------------------------------

    #[test]
    fn cyclic_nest_rejected_at_planning() {
        let mut snapshot = basic_snapshot(true);
        snapshot.containers.get_mut(&2).unwrap().parent_container_id = Some(1);
        let ctx = context(snapshot);
        let result = plan_intent(
            &CanvasIntent::NestContainer {
                container_id: 1,
                parent_id: 2,
            },
            &ctx,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn unnest_of_root_container_forbidden() {
        let ctx = context(basic_snapshot(true));
        let result = plan_intent(&CanvasIntent::UnnestContainer { container_id: 1 }, &ctx);
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }

    // -- Activation (Scenario C) --------------------------------------------

    #[test]
    fn ghost_activation_plans_state_change() {
        let ctx = context(basic_snapshot(true));
        let plan = plan_intent(
            &CanvasIntent::ActivateContainer {
                container_id: 2,
                title: "promoted".into(),
                body: String::new(),
            },
            &ctx,
        )
        .unwrap();
        assert_matches!(plan.mutations[0], Mutation::ActivateContainer { .. });
        assert_eq!(plan.events, vec![BehavioralEventKind::ContainerActivated]);
    }

    #[test]
    fn second_activation_is_forbidden() {
        let ctx = context(basic_snapshot(true));
        let result = plan_intent(
            &CanvasIntent::ActivateContainer {
                container_id: 1,
                title: "again".into(),
                body: String::new(),
            },
            &ctx,
        );
        assert_matches!(result, Err(CoreError::Forbidden(msg)) if msg.contains("already active"));
    }

    #[test]
    fn activation_without_content_rejected() {
        let ctx = context(basic_snapshot(true));
        let result = plan_intent(
            &CanvasIntent::ActivateContainer {
                container_id: 2,
                title: "  ".into(),
                body: String::new(),
            },
            &ctx,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    // -- Nodes --------------------------------------------------------------

    fn snapshot_with_auto_node() -> GraphSnapshot {
        let mut s = basic_snapshot(true);
        s.ports.insert(
            10,
            Port {
                id: 10,
                container_id: 1,
            },
        );
        s.ports.insert(
            11,
            Port {
                id: 11,
                container_id: 2,
            },
        );
        s.nodes.insert(
            20,
            NodeEdge {
                id: 20,
                workspace_id: 1,
                from_port_id: 10,
                to_port_id: 11,
                source_generated: true,
            },
        );
        s
    }

    #[test]
    fn deleting_auto_node_breaks_layout() {
        let ctx = context(snapshot_with_auto_node());
        let plan = plan_intent(&CanvasIntent::DeleteNode { node_id: 20 }, &ctx).unwrap();
        assert_eq!(plan.mutations.len(), 2);
        assert_matches!(
            plan.mutations[1],
            Mutation::SetLayoutIntact { intact: false, .. }
        );
    }

    #[test]
    fn deleting_manual_node_keeps_layout() {
        let mut snapshot = snapshot_with_auto_node();
        snapshot.nodes.get_mut(&20).unwrap().source_generated = false;
        let ctx = context(snapshot);
        let plan = plan_intent(&CanvasIntent::DeleteNode { node_id: 20 }, &ctx).unwrap();
        assert_eq!(plan.mutations.len(), 1);
    }

    #[test]
    fn manual_node_between_same_container_rejected() {
        let mut snapshot = basic_snapshot(true);
        snapshot.ports.insert(
            10,
            Port {
                id: 10,
                container_id: 1,
            },
        );
        snapshot.ports.insert(
            12,
            Port {
                id: 12,
                container_id: 1,
            },
        );
        let ctx = context(snapshot);
        let result = plan_intent(
            &CanvasIntent::CreateNode {
                from_port_id: 10,
                to_port_id: 12,
            },
            &ctx,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    // -- Materialization (Scenarios A and B) --------------------------------

    fn mirrored_parent_snapshot() -> GraphSnapshot {
        let mut s = GraphSnapshot::new(workspace(true));
        let mut parent = container(1, ContainerState::Ghost);
        parent.is_auto_generated = true;
        s.containers.insert(1, parent);
        s.references.insert(
            30,
            ContainerReference {
                id: 30,
                container_id: 1,
                entity_type: "project".into(),
                entity_id: 100,
                is_primary: true,
                parent_entity_type: None,
                parent_entity_id: None,
            },
        );
        s
    }

    #[test]
    fn entity_created_while_intact_nests_and_links() {
        // Scenario A: child of a mirrored parent materializes nested with
        // one auto-generated node.
        let ctx = context(mirrored_parent_snapshot());
        let plan = plan_source_event(
            &SourceEvent::EntityCreated {
                entity: SourceRef::new("task", 200),
                title: "subtask".into(),
                parent: Some(SourceRef::new("project", 100)),
            },
            &ctx,
        )
        .unwrap();

        assert_matches!(
            plan.mutations[0],
            Mutation::CreateContainer {
                state: ContainerState::Ghost,
                parent: Some(EntityRef::Existing { id: 1 }),
                is_auto_generated: true,
                ..
            }
        );
        assert!(plan
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::CreateNode { source_generated: true, .. })));
        assert_eq!(plan.events, vec![BehavioralEventKind::GhostMaterialized]);
    }

    #[test]
    fn entity_created_after_break_spawns_at_origin() {
        // Scenario B: once the user took manual control, new ghosts spawn
        // at the origin offset, unnested, with no auto node.
        let mut snapshot = mirrored_parent_snapshot();
        snapshot.workspace.layout_intact = false;
        let ctx = context(snapshot);
        let plan = plan_source_event(
            &SourceEvent::EntityCreated {
                entity: SourceRef::new("task", 200),
                title: "subtask".into(),
                parent: Some(SourceRef::new("project", 100)),
            },
            &ctx,
        )
        .unwrap();

        assert_matches!(
            &plan.mutations[0],
            Mutation::CreateContainer {
                position,
                parent: None,
                ..
            } if *position == origin_spawn_position()
        );
        assert!(!plan
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::CreateNode { .. })));
    }

    #[test]
    fn redelivered_entity_created_is_noop() {
        let ctx = context(mirrored_parent_snapshot());
        let plan = plan_source_event(
            &SourceEvent::EntityCreated {
                entity: SourceRef::new("project", 100),
                title: "project".into(),
                parent: None,
            },
            &ctx,
        )
        .unwrap();
        assert!(plan.mutations.is_empty());
        assert!(plan.events.is_empty());
    }

    #[test]
    fn entity_updated_syncs_ghost_title() {
        let ctx = context(mirrored_parent_snapshot());
        let plan = plan_source_event(
            &SourceEvent::EntityUpdated {
                entity: SourceRef::new("project", 100),
                title: "renamed project".into(),
                parent: None,
            },
            &ctx,
        )
        .unwrap();
        assert_matches!(
            &plan.mutations[0],
            Mutation::SyncGhostContent { title, .. } if title == "renamed project"
        );
    }

    #[test]
    fn entity_updated_leaves_active_content_alone() {
        let mut snapshot = mirrored_parent_snapshot();
        snapshot.containers.get_mut(&1).unwrap().state = ContainerState::Active;
        let ctx = context(snapshot);
        let plan = plan_source_event(
            &SourceEvent::EntityUpdated {
                entity: SourceRef::new("project", 100),
                title: "renamed project".into(),
                parent: None,
            },
            &ctx,
        )
        .unwrap();
        assert!(!plan
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::SyncGhostContent { .. })));
    }

    #[test]
    fn entity_deleted_breaks_reference_and_keeps_container() {
        let ctx = context(mirrored_parent_snapshot());
        let plan = plan_source_event(
            &SourceEvent::EntityDeleted {
                entity: SourceRef::new("project", 100),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(
            plan.mutations,
            vec![Mutation::DeleteReference {
                reference: EntityRef::existing(30),
            }]
        );
        assert_eq!(plan.events, vec![BehavioralEventKind::ReferenceBroken]);
    }

    #[test]
    fn broken_primary_hands_off_to_earliest_sibling() {
        let mut snapshot = mirrored_parent_snapshot();
        snapshot.references.insert(
            31,
            ContainerReference {
                id: 31,
                container_id: 1,
                entity_type: "task".into(),
                entity_id: 200,
                is_primary: false,
                parent_entity_type: None,
                parent_entity_id: None,
            },
        );
        snapshot.references.insert(
            32,
            ContainerReference {
                id: 32,
                container_id: 1,
                entity_type: "task".into(),
                entity_id: 201,
                is_primary: false,
                parent_entity_type: None,
                parent_entity_id: None,
            },
        );
        let ctx = context(snapshot);
        let plan = plan_source_event(
            &SourceEvent::EntityDeleted {
                entity: SourceRef::new("project", 100),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(
            plan.mutations[0],
            Mutation::SetPrimaryReference {
                container: EntityRef::existing(1),
                reference: EntityRef::existing(31),
            }
        );
        assert_eq!(
            plan.mutations[1],
            Mutation::DeleteReference {
                reference: EntityRef::existing(30),
            }
        );
    }

    // -- Reset layout -------------------------------------------------------

    #[test]
    fn reset_layout_restores_flag_and_regenerates_nodes() {
        // Parent and child mirrored, layout broken, no auto nodes left.
        let mut snapshot = mirrored_parent_snapshot();
        snapshot.workspace.layout_intact = false;
        let mut child = container(2, ContainerState::Ghost);
        child.is_auto_generated = true;
        snapshot.containers.insert(2, child);
        snapshot.references.insert(
            31,
            ContainerReference {
                id: 31,
                container_id: 2,
                entity_type: "task".into(),
                entity_id: 200,
                is_primary: true,
                parent_entity_type: Some("project".into()),
                parent_entity_id: Some(100),
            },
        );
        let ctx = context(snapshot);
        let plan = plan_intent(&CanvasIntent::ResetLayout, &ctx).unwrap();

        assert_matches!(
            plan.mutations.last(),
            Some(Mutation::SetLayoutIntact {
                intact: true,
                reset_at: None,
            })
        );
        assert!(plan
            .mutations
            .iter()
            .any(|m| matches!(m, Mutation::CreateNode { source_generated: true, .. })));
        assert!(plan
            .mutations
            .iter()
            .any(|m| matches!(
                m,
                Mutation::SetParent {
                    container: EntityRef::Existing { id: 2 },
                    parent: Some(EntityRef::Existing { id: 1 }),
                }
            )));
        assert_eq!(plan.events, vec![BehavioralEventKind::LayoutReset]);
    }
}
