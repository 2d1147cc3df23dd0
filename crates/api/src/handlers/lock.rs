//! Canvas lock handlers.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use ideaflow_core::types::DbId;
use ideaflow_db::repositories::lock_repo::validate_lock_ttl;
use ideaflow_db::repositories::CanvasLockRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for lock acquisition.
#[derive(Debug, Deserialize)]
pub struct AcquireLockRequest {
    pub actor_id: DbId,
    /// Optional override of the configured lock duration.
    pub ttl_secs: Option<i64>,
}

/// Request body for lock release.
#[derive(Debug, Deserialize)]
pub struct ReleaseLockRequest {
    pub actor_id: DbId,
}

/// POST /api/v1/workspaces/{id}/lock
///
/// Acquire the canvas lock. Contention returns the current holder.
pub async fn acquire_lock(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Json(input): Json<AcquireLockRequest>,
) -> AppResult<impl IntoResponse> {
    let ttl_secs = input.ttl_secs.unwrap_or(state.config.lock_ttl_secs);
    validate_lock_ttl(ttl_secs).map_err(AppError::BadRequest)?;

    match CanvasLockRepo::acquire(&state.pool, workspace_id, input.actor_id, ttl_secs).await? {
        Some(lock) => {
            tracing::info!(
                workspace_id,
                holder_id = input.actor_id,
                "Canvas lock acquired",
            );
            Ok(Json(DataResponse { data: lock }))
        }
        None => {
            // Refresh instead of refusing when the caller already holds it.
            if let Some(lock) =
                CanvasLockRepo::extend(&state.pool, workspace_id, input.actor_id, ttl_secs).await?
            {
                return Ok(Json(DataResponse { data: lock }));
            }
            let holder = CanvasLockRepo::get_active(&state.pool, workspace_id)
                .await?
                .ok_or_else(|| AppError::BadRequest("canvas lock contention".into()))?;
            Err(AppError::LockHeld {
                holder_id: holder.holder_id,
                expires_at: holder.expires_at,
            })
        }
    }
}

/// DELETE /api/v1/workspaces/{id}/lock
///
/// Release the lock; only the holder can.
pub async fn release_lock(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
    Json(input): Json<ReleaseLockRequest>,
) -> AppResult<impl IntoResponse> {
    let released = CanvasLockRepo::release(&state.pool, workspace_id, input.actor_id).await?;
    if released {
        tracing::info!(
            workspace_id,
            holder_id = input.actor_id,
            "Canvas lock released",
        );
    }
    Ok(Json(DataResponse {
        data: json!({ "released": released }),
    }))
}

/// GET /api/v1/workspaces/{id}/lock
///
/// Inspect the current lock; read-only.
pub async fn get_lock(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let lock = CanvasLockRepo::get_active(&state.pool, workspace_id).await?;
    Ok(Json(DataResponse { data: lock }))
}
