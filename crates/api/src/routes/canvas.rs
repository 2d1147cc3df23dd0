use axum::routing::{get, post};
use axum::Router;

use crate::handlers::canvas;
use crate::state::AppState;

/// Canvas engine routes mounted under `/workspaces/{id}`.
///
/// ```text
/// GET  /{id}/graph          -> get_graph (read-only, lock-free)
/// POST /{id}/intents        -> post_intent
/// POST /{id}/source-events  -> post_source_event
/// POST /{id}/rollback       -> post_rollback
/// GET  /{id}/telemetry      -> get_telemetry_summary
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/workspaces/{id}/graph", get(canvas::get_graph))
        .route("/workspaces/{id}/intents", post(canvas::post_intent))
        .route(
            "/workspaces/{id}/source-events",
            post(canvas::post_source_event),
        )
        .route("/workspaces/{id}/rollback", post(canvas::post_rollback))
        .route(
            "/workspaces/{id}/telemetry",
            get(canvas::get_telemetry_summary),
        )
}
