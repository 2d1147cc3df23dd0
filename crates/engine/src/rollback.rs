//! Best-effort rollback of the most recent stored plan (PRD-25).
//!
//! Requires the caller to hold the canvas lock, applies the recorded
//! inverse mutations transactionally, and consumes the history entry.
//! Irreversible plans are refused with their recorded reasons rather than
//! silently skipped. Rollback never emits behavioral events or telemetry.

use chrono::Utc;
use sqlx::PgPool;

use ideaflow_core::error::CoreError;
use ideaflow_core::plan::SlotMap;
use ideaflow_db::repositories::StoredPlanRepo;

use crate::apply::apply_mutation;
use crate::context::{ExecutionContext, RollbackReport};
use crate::executor::assert_lock;

/// Undo the most recently executed plan for a workspace.
pub async fn rollback(
    pool: &PgPool,
    workspace_id: ideaflow_core::types::DbId,
    actor_id: ideaflow_core::types::DbId,
) -> Result<RollbackReport, CoreError> {
    let ctx = ExecutionContext {
        workspace_id,
        actor_id,
    };
    assert_lock(pool, &ctx).await?;

    let stored = StoredPlanRepo::latest(pool, workspace_id)
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?
        .ok_or(CoreError::NotFound {
            entity: "StoredPlan",
            id: workspace_id,
        })?;

    if !stored.is_reversible {
        return Err(CoreError::Rollback {
            reasons: stored.reasons(),
        });
    }

    let mutations = stored.inverse_mutations().map_err(|e| CoreError::Rollback {
        reasons: vec![format!("stored inverse is unreadable: {e}")],
    })?;

    let now = Utc::now();
    let mut slots = SlotMap::new();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| CoreError::Execution(e.to_string()))?;
    for mutation in &mutations {
        apply_mutation(&mut tx, workspace_id, mutation, &mut slots, now)
            .await
            .map_err(|err| CoreError::Rollback {
                reasons: vec![err.to_string()],
            })?;
    }
    tx.commit()
        .await
        .map_err(|e| CoreError::Execution(e.to_string()))?;

    // The entry is consumed; rolling back twice needs two entries.
    if let Err(err) = StoredPlanRepo::delete(pool, stored.id).await {
        tracing::warn!(
            workspace_id,
            plan_id = stored.id,
            error = %err,
            "Failed to consume rolled-back history entry",
        );
    }

    tracing::info!(
        workspace_id,
        actor_id,
        plan_id = stored.id,
        description = %stored.description,
        "Plan rolled back",
    );

    Ok(RollbackReport {
        workspace_id,
        plan_id: stored.id,
        description: stored.description,
        mutations_applied: mutations.len(),
    })
}
