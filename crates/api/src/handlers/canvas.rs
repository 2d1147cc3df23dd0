//! Handlers for the canvas engine surface: graph reads, intent and
//! source-event ingress, rollback, and the telemetry summary.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use ideaflow_core::graph::{
    Container, ContainerReference, NodeEdge, Port, WorkspaceMeta,
};
use ideaflow_core::intent::{CanvasIntent, SourceEvent};
use ideaflow_core::types::{DbId, Timestamp};
use ideaflow_db::models::lock::CanvasLock;
use ideaflow_db::repositories::{CanvasLockRepo, GraphRepo, TelemetryRepo};
use ideaflow_engine::context::{ExecutionContext, ExecutionReport, OrchestrationOutcome};
use ideaflow_engine::orchestrator::{handle_intent, handle_source_event};
use ideaflow_engine::rollback::rollback;

use crate::error::{error_body, AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Graph read
// ---------------------------------------------------------------------------

/// Optional viewer identity on graph reads.
#[derive(Debug, Deserialize)]
pub struct GraphQuery {
    pub actor_id: Option<DbId>,
}

/// A lock row as shown to viewers.
#[derive(Debug, Serialize)]
pub struct LockView {
    pub holder_id: DbId,
    pub acquired_at: Timestamp,
    pub expires_at: Timestamp,
}

impl From<&CanvasLock> for LockView {
    fn from(lock: &CanvasLock) -> Self {
        Self {
            holder_id: lock.holder_id,
            acquired_at: lock.acquired_at,
            expires_at: lock.expires_at,
        }
    }
}

/// Full graph view plus per-viewer flags.
#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub workspace: WorkspaceMeta,
    pub containers: Vec<Container>,
    pub ports: Vec<Port>,
    pub nodes: Vec<NodeEdge>,
    pub references: Vec<ContainerReference>,
    pub lock: Option<LockView>,
    /// Whether the requesting viewer currently holds a live lock.
    pub viewer_holds_lock: bool,
}

/// GET /api/v1/workspaces/{id}/graph
///
/// Read-only; never requires the canvas lock.
pub async fn get_graph(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Query(query): Query<GraphQuery>,
) -> AppResult<impl IntoResponse> {
    let snapshot = GraphRepo::load_snapshot(&state.pool, workspace_id).await?;
    let lock = CanvasLockRepo::get_active(&state.pool, workspace_id).await?;

    let now = Utc::now();
    let viewer_holds_lock = match (&lock, query.actor_id) {
        (Some(lock), Some(actor_id)) => lock.holder_id == actor_id && lock.is_live(now),
        _ => false,
    };

    let response = GraphResponse {
        workspace: snapshot.workspace.clone(),
        containers: snapshot.containers.into_values().collect(),
        ports: snapshot.ports.into_values().collect(),
        nodes: snapshot.nodes.into_values().collect(),
        references: snapshot.references.into_values().collect(),
        lock: lock.as_ref().filter(|l| l.is_live(now)).map(LockView::from),
        viewer_holds_lock,
    };

    Ok(Json(DataResponse { data: response }))
}

// ---------------------------------------------------------------------------
// Intent ingress
// ---------------------------------------------------------------------------

/// Request body for intent submission.
#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub actor_id: DbId,
    pub intent: CanvasIntent,
}

/// Compact plan view echoed back to callers.
#[derive(Debug, Serialize)]
pub struct PlanView {
    pub description: String,
    pub mutation_count: usize,
    pub events: Vec<String>,
}

/// Combined planning/execution result.
///
/// Planning and execution errors are kept separate so callers can
/// distinguish "nothing happened" from "something happened but a later step
/// failed".
#[derive(Debug, Serialize)]
pub struct OrchestrationResponse {
    pub success: bool,
    pub plan: Option<PlanView>,
    pub planning_error: Option<serde_json::Value>,
    pub execution: Option<ExecutionReport>,
    pub execution_error: Option<serde_json::Value>,
}

fn orchestration_response(outcome: OrchestrationOutcome) -> OrchestrationResponse {
    let success = outcome.is_success();
    let (plan, planning_error) = match outcome.planning {
        Ok(plan) => (
            Some(PlanView {
                description: plan.description.clone(),
                mutation_count: plan.mutations.len(),
                events: plan.events.iter().map(|k| k.as_str().to_string()).collect(),
            }),
            None,
        ),
        Err(err) => (None, Some(error_body(&err))),
    };
    let (execution, execution_error) = match outcome.execution {
        Some(Ok(report)) => (Some(report), None),
        Some(Err(err)) => (None, Some(error_body(&err))),
        None => (None, None),
    };

    OrchestrationResponse {
        success,
        plan,
        planning_error,
        execution,
        execution_error,
    }
}

/// POST /api/v1/workspaces/{id}/intents
///
/// Side-effecting; the caller must already hold the canvas lock.
pub async fn post_intent(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Json(input): Json<IntentRequest>,
) -> AppResult<impl IntoResponse> {
    let ctx = ExecutionContext {
        workspace_id,
        actor_id: input.actor_id,
    };
    let outcome = handle_intent(&state.pool, &state.event_bus, &input.intent, &ctx).await;

    Ok(Json(DataResponse {
        data: orchestration_response(outcome),
    }))
}

// ---------------------------------------------------------------------------
// Source-of-truth event ingress
// ---------------------------------------------------------------------------

/// Request body for mirrored lifecycle events.
#[derive(Debug, Deserialize)]
pub struct SourceEventRequest {
    /// Service identity of the integration delivering the event.
    pub actor_id: DbId,
    pub event: SourceEvent,
}

/// POST /api/v1/workspaces/{id}/source-events
///
/// The integration usually does not manage locks itself: when the actor
/// does not already hold the lock, it is acquired for the duration of this
/// call and released afterwards. A live foreign lock yields contention.
pub async fn post_source_event(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Json(input): Json<SourceEventRequest>,
) -> AppResult<impl IntoResponse> {
    let ctx = ExecutionContext {
        workspace_id,
        actor_id: input.actor_id,
    };

    let now = Utc::now();
    let existing = CanvasLockRepo::get_active(&state.pool, workspace_id).await?;
    let transient = match existing {
        Some(ref lock) if lock.is_live(now) && lock.holder_id != input.actor_id => {
            return Err(AppError::LockHeld {
                holder_id: lock.holder_id,
                expires_at: lock.expires_at,
            });
        }
        Some(ref lock) if lock.is_live(now) => false,
        _ => {
            CanvasLockRepo::acquire(
                &state.pool,
                workspace_id,
                input.actor_id,
                state.config.lock_ttl_secs,
            )
            .await?
            .ok_or_else(|| AppError::BadRequest("canvas lock contention".into()))?;
            true
        }
    };

    let outcome = handle_source_event(&state.pool, &state.event_bus, &input.event, &ctx).await;

    if transient {
        CanvasLockRepo::release(&state.pool, workspace_id, input.actor_id).await?;
    }

    Ok(Json(DataResponse {
        data: orchestration_response(outcome),
    }))
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Request body for rollback.
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub actor_id: DbId,
}

/// POST /api/v1/workspaces/{id}/rollback
pub async fn post_rollback(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Json(input): Json<RollbackRequest>,
) -> AppResult<impl IntoResponse> {
    let report = rollback(&state.pool, workspace_id, input.actor_id).await?;
    Ok(Json(DataResponse { data: report }))
}

// ---------------------------------------------------------------------------
// Telemetry summary
// ---------------------------------------------------------------------------

/// GET /api/v1/workspaces/{id}/telemetry
///
/// Descriptive counts only: totals per event kind, no scores, no
/// comparisons.
pub async fn get_telemetry_summary(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let counts = TelemetryRepo::counts_by_kind(&state.pool, workspace_id).await?;
    let total: i64 = counts.iter().map(|c| c.count).sum();

    Ok(Json(DataResponse {
        data: serde_json::json!({
            "workspace_id": workspace_id,
            "total": total,
            "by_kind": counts,
        }),
    }))
}
