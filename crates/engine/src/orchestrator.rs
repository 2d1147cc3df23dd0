//! Orchestration: plan, then execute (PRD-25).
//!
//! Pure coordination. On planning failure it returns immediately without
//! touching execution; on success it forwards the plan to the executor and
//! returns both results verbatim. No domain logic lives here.

use chrono::Utc;
use sqlx::PgPool;

use ideaflow_core::intent::{CanvasIntent, SourceEvent};
use ideaflow_core::planner::{self, LockClaim, PlanningContext};
use ideaflow_db::repositories::CanvasLockRepo;
use ideaflow_events::EventBus;

use crate::context::{ExecutionContext, OrchestrationOutcome};
use crate::executor::{self, load_snapshot};

/// Plan and execute a user intent.
pub async fn handle_intent(
    pool: &PgPool,
    bus: &EventBus,
    intent: &CanvasIntent,
    ctx: &ExecutionContext,
) -> OrchestrationOutcome {
    let planning_ctx = match planning_context(pool, ctx).await {
        Ok(planning_ctx) => planning_ctx,
        Err(err) => {
            return OrchestrationOutcome {
                planning: Err(err),
                execution: None,
            }
        }
    };

    match planner::plan_intent(intent, &planning_ctx) {
        Err(err) => OrchestrationOutcome {
            planning: Err(err),
            execution: None,
        },
        Ok(plan) => {
            let execution = executor::execute(pool, bus, &plan, ctx).await;
            OrchestrationOutcome {
                planning: Ok(plan),
                execution: Some(execution),
            }
        }
    }
}

/// Plan and execute a source-of-truth lifecycle event.
pub async fn handle_source_event(
    pool: &PgPool,
    bus: &EventBus,
    event: &SourceEvent,
    ctx: &ExecutionContext,
) -> OrchestrationOutcome {
    let planning_ctx = match planning_context(pool, ctx).await {
        Ok(planning_ctx) => planning_ctx,
        Err(err) => {
            return OrchestrationOutcome {
                planning: Err(err),
                execution: None,
            }
        }
    };

    match planner::plan_source_event(event, &planning_ctx) {
        Err(err) => OrchestrationOutcome {
            planning: Err(err),
            execution: None,
        },
        Ok(plan) => {
            let execution = executor::execute(pool, bus, &plan, ctx).await;
            OrchestrationOutcome {
                planning: Ok(plan),
                execution: Some(execution),
            }
        }
    }
}

/// Snapshot current state and the lock claim into a pure planning context.
async fn planning_context(
    pool: &PgPool,
    ctx: &ExecutionContext,
) -> Result<PlanningContext, ideaflow_core::error::CoreError> {
    let snapshot = load_snapshot(pool, ctx.workspace_id).await?;
    let lock = CanvasLockRepo::get_active(pool, ctx.workspace_id)
        .await
        .map_err(|e| ideaflow_core::error::CoreError::Internal(e.to_string()))?
        .map(|lock| LockClaim {
            holder_id: lock.holder_id,
            expires_at: lock.expires_at,
        });

    Ok(PlanningContext {
        snapshot,
        actor_id: ctx.actor_id,
        now: Utc::now(),
        lock,
    })
}
