use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ideaflow_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from the canvas engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Lock contention: someone else holds the canvas lock.
    #[error("Canvas lock is held by user {holder_id}")]
    LockHeld {
        holder_id: i64,
        expires_at: ideaflow_core::types::Timestamp,
    },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// JSON body describing a [`CoreError`] — reused by the orchestration
/// response so planning and execution errors keep the same shape inline.
pub fn error_body(err: &CoreError) -> serde_json::Value {
    match err {
        CoreError::Validation(violations) => json!({
            "code": err.code(),
            "error": err.to_string(),
            "violations": violations,
        }),
        CoreError::Rollback { reasons } => json!({
            "code": err.code(),
            "error": err.to_string(),
            "reasons": reasons,
        }),
        other => json!({
            "code": other.code(),
            "error": other.to_string(),
        }),
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Precondition(_) => StatusCode::CONFLICT,
        CoreError::LockViolation(_) => StatusCode::LOCKED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::Execution(_) | CoreError::Rollback { .. } | CoreError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Core(core) => {
                if matches!(
                    core,
                    CoreError::Execution(_) | CoreError::Internal(_)
                ) {
                    tracing::error!(error = %core, "Engine error");
                }
                (status_for(&core), axum::Json(error_body(&core))).into_response()
            }

            AppError::Database(err) => {
                if matches!(err, sqlx::Error::RowNotFound) {
                    let body = json!({ "code": "not_found", "error": "Resource not found" });
                    return (StatusCode::NOT_FOUND, axum::Json(body)).into_response();
                }
                tracing::error!(error = %err, "Database error");
                let body = json!({
                    "code": "internal_error",
                    "error": "An internal error occurred",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }

            AppError::BadRequest(msg) => {
                let body = json!({ "code": "bad_request", "error": msg });
                (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
            }

            AppError::LockHeld {
                holder_id,
                expires_at,
            } => {
                let body = json!({
                    "code": "lock_violation",
                    "error": format!("Canvas lock is held by user {holder_id}"),
                    "holder_id": holder_id,
                    "expires_at": expires_at,
                });
                (StatusCode::CONFLICT, axum::Json(body)).into_response()
            }
        }
    }
}
