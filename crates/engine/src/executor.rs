//! Plan execution (PRD-25).
//!
//! Steps, strictly ordered:
//! 1. assert the caller holds a live workspace lock;
//! 2. re-validate every mutation against the *current* persisted snapshot,
//!    not the one the plan was built against;
//! 3. apply all mutations in one transaction;
//! 4. on commit success only, publish behavioral events and append
//!    firewall-sanitized telemetry;
//! 5. record the plan and its computed inverse into the bounded history;
//! 6. never release the lock — that stays with the caller.

use chrono::Utc;
use sqlx::PgPool;

use ideaflow_core::error::CoreError;
use ideaflow_core::graph::GraphSnapshot;
use ideaflow_core::plan::{self, Plan, SlotMap};
use ideaflow_core::telemetry::{self, BehavioralEvent, BehavioralEventKind};
use ideaflow_core::types::DbId;
use ideaflow_core::validation;
use ideaflow_db::models::stored_plan::NewStoredPlan;
use ideaflow_db::repositories::{CanvasLockRepo, GraphRepo, StoredPlanRepo, TelemetryRepo};
use ideaflow_events::EventBus;

use crate::apply::apply_mutation;
use crate::context::{ExecutionContext, ExecutionReport};

/// Execute a plan against persisted state.
pub async fn execute(
    pool: &PgPool,
    bus: &EventBus,
    plan: &Plan,
    ctx: &ExecutionContext,
) -> Result<ExecutionReport, CoreError> {
    if plan.workspace_id != ctx.workspace_id {
        return Err(CoreError::Forbidden(format!(
            "plan targets workspace {} but context is scoped to {}",
            plan.workspace_id, ctx.workspace_id
        )));
    }

    let now = Utc::now();

    // (1) Lock assertion against the authoritative row.
    assert_lock(pool, ctx).await?;

    // (2) Precondition re-check: the graph may have moved since planning.
    let snapshot = load_snapshot(pool, ctx.workspace_id).await?;
    validation::validate_plan(plan, &snapshot).map_err(|violations| {
        CoreError::Precondition(
            violations
                .iter()
                .map(|v| v.message())
                .collect::<Vec<_>>()
                .join("; "),
        )
    })?;

    // The inverse is computed against the pre-state the plan will actually
    // run on.
    let mut inverse = plan::invert_plan(plan, &snapshot);

    // (3) One transaction; any failure aborts everything.
    let mut slots = SlotMap::new();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| CoreError::Execution(e.to_string()))?;
    for mutation in &plan.mutations {
        apply_mutation(&mut tx, ctx.workspace_id, mutation, &mut slots, now).await?;
    }
    tx.commit()
        .await
        .map_err(|e| CoreError::Execution(e.to_string()))?;

    // Slots bound during the forward apply become concrete ids in the
    // recorded inverse.
    plan::resolve_planned_refs(&mut inverse.mutations, &slots);

    // (4) Post-commit only: behavioral events and sanitized telemetry.
    let mut telemetry_recorded = 0;
    for kind in &plan.events {
        let event = BehavioralEvent::new(*kind, ctx.workspace_id, ctx.actor_id, now)
            .with_payload(event_payload(plan, &snapshot, *kind));
        bus.publish(event.clone());

        match telemetry::sanitize(&event) {
            Ok(record) => match TelemetryRepo::append(pool, &record).await {
                Ok(_) => telemetry_recorded += 1,
                Err(err) => {
                    tracing::warn!(
                        workspace_id = ctx.workspace_id,
                        kind = kind.as_str(),
                        error = %err,
                        "Telemetry append failed after commit",
                    );
                }
            },
            Err(rejection) => {
                tracing::warn!(
                    workspace_id = ctx.workspace_id,
                    kind = kind.as_str(),
                    reason = %rejection,
                    "Telemetry firewall rejected event",
                );
            }
        }
    }

    // (5) Bounded history entry enabling best-effort rollback.
    let is_reversible = inverse.is_reversible;
    let reasons = inverse.reasons.clone();
    let history = StoredPlanRepo::push(
        pool,
        &NewStoredPlan {
            workspace_id: ctx.workspace_id,
            description: plan.description.clone(),
            mutations: plan.mutations.clone(),
            inverse,
            executed_by: ctx.actor_id,
        },
    )
    .await;
    let history_recorded = match history {
        Ok(_) => true,
        Err(err) => {
            tracing::error!(
                workspace_id = ctx.workspace_id,
                error = %err,
                "History append failed; the committed plan cannot be rolled back",
            );
            false
        }
    };

    tracing::info!(
        workspace_id = ctx.workspace_id,
        actor_id = ctx.actor_id,
        mutations = plan.mutations.len(),
        reversible = is_reversible,
        description = %plan.description,
        "Plan executed",
    );

    Ok(ExecutionReport {
        workspace_id: ctx.workspace_id,
        mutations_applied: plan.mutations.len(),
        events_emitted: plan.events.len(),
        telemetry_recorded,
        is_reversible,
        irreversibility_reasons: reasons,
        history_recorded,
        executed_at: now,
    })
}

/// Fail with `lock_violation` unless the caller holds a live lock.
pub(crate) async fn assert_lock(pool: &PgPool, ctx: &ExecutionContext) -> Result<(), CoreError> {
    let now = Utc::now();
    let lock = CanvasLockRepo::get_active(pool, ctx.workspace_id)
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    match lock {
        None => Err(CoreError::LockViolation(format!(
            "no canvas lock held for workspace {}",
            ctx.workspace_id
        ))),
        Some(lock) if lock.holder_id != ctx.actor_id => Err(CoreError::LockViolation(format!(
            "canvas lock is held by user {}",
            lock.holder_id
        ))),
        Some(lock) if !lock.is_live(now) => Err(CoreError::LockViolation(
            "canvas lock has expired".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

pub(crate) async fn load_snapshot(
    pool: &PgPool,
    workspace_id: DbId,
) -> Result<GraphSnapshot, CoreError> {
    GraphRepo::load_snapshot(pool, workspace_id)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => CoreError::NotFound {
                entity: "Workspace",
                id: workspace_id,
            },
            other => CoreError::Internal(other.to_string()),
        })
}

/// Build the allow-list-shaped payload for a behavioral event.
///
/// Only fields the firewall accepts are worth putting here; anything else
/// would be stripped on the way to the telemetry store, and the bus
/// consumers get the same shape.
fn event_payload(
    plan: &Plan,
    pre_state: &GraphSnapshot,
    kind: BehavioralEventKind,
) -> serde_json::Value {
    use ideaflow_core::plan::Mutation;

    let mut payload = serde_json::Map::new();

    // Layout flag after the plan: the last SetLayoutIntact wins, else the
    // pre-state value carries over.
    let layout_after = plan
        .mutations
        .iter()
        .rev()
        .find_map(|m| match m {
            Mutation::SetLayoutIntact { intact, .. } => Some(*intact),
            _ => None,
        })
        .unwrap_or(pre_state.workspace.layout_intact);
    payload.insert("layout_intact".into(), layout_after.into());

    if let Some(entity_type) = plan.mutations.iter().find_map(|m| match m {
        Mutation::CreateReference { entity_type, .. } => Some(entity_type.clone()),
        _ => None,
    }) {
        payload.insert("entity_type".into(), entity_type.into());
    }

    if let Some(source_generated) = plan.mutations.iter().find_map(|m| match m {
        Mutation::CreateNode {
            source_generated, ..
        } => Some(*source_generated),
        _ => None,
    }) {
        payload.insert("source_generated".into(), source_generated.into());
    }

    let trigger = match kind {
        BehavioralEventKind::GhostMaterialized
        | BehavioralEventKind::GhostSynced
        | BehavioralEventKind::ReferenceBroken => "source",
        _ => "user",
    };
    payload.insert("trigger".into(), trigger.into());

    serde_json::Value::Object(payload)
}
