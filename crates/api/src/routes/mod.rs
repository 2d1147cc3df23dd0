pub mod canvas;
pub mod health;
pub mod lock;
pub mod workspace;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /workspaces                          list, create
/// /workspaces/{id}                     get
/// /workspaces/{id}/graph               read-only graph snapshot
/// /workspaces/{id}/intents             user intent ingress (POST)
/// /workspaces/{id}/source-events       source-of-truth event ingress (POST)
/// /workspaces/{id}/rollback            undo last plan (POST)
/// /workspaces/{id}/telemetry           descriptive counts (GET)
/// /workspaces/{id}/lock                acquire, release, inspect
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(workspace::router())
        .merge(canvas::router())
        .merge(lock::router())
}
