//! Liveness endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /health
///
/// Liveness plus a database ping.
pub async fn health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    ideaflow_db::health_check(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
