use axum::routing::get;
use axum::Router;

use crate::handlers::lock;
use crate::state::AppState;

/// Canvas lock routes mounted at `/workspaces/{id}/lock`.
///
/// ```text
/// POST   /workspaces/{id}/lock   -> acquire_lock
/// DELETE /workspaces/{id}/lock   -> release_lock
/// GET    /workspaces/{id}/lock   -> get_lock
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/workspaces/{id}/lock",
        get(lock::get_lock)
            .post(lock::acquire_lock)
            .delete(lock::release_lock),
    )
}
