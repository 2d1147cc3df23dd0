//! Domain error taxonomy shared by planning, execution, and transport.
//!
//! Planning and validation failures are returned before any persisted state
//! is touched. Execution failures abort the enclosing transaction. The API
//! layer maps each variant to an HTTP status in `ideaflow-api::error`.

use crate::types::DbId;
use crate::validation::Violation;

/// Error type for all canvas engine operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// One or more structural invariants were violated. Always raised before
    /// any mutation is attempted.
    #[error("validation failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    /// Persisted state changed between planning and execution.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The caller does not hold a live canvas lock for the workspace.
    #[error("lock violation: {0}")]
    LockViolation(String),

    /// The operation is outside the engine's allowed scope, or an
    /// unwhitelisted repair was attempted.
    #[error("forbidden operation: {0}")]
    Forbidden(String),

    /// A mutation failed while being applied. The enclosing transaction is
    /// rolled back; no partial commit is observable.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The inverse of a stored plan could not be applied.
    #[error("rollback failed: {}", .reasons.join("; "))]
    Rollback { reasons: Vec<String> },

    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Stable machine-readable code for transport and telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "not_found",
            CoreError::Validation(_) => "validation_failure",
            CoreError::Precondition(_) => "precondition_failure",
            CoreError::LockViolation(_) => "lock_violation",
            CoreError::Forbidden(_) => "forbidden_operation",
            CoreError::Execution(_) => "execution_failure",
            CoreError::Rollback { .. } => "rollback_failure",
            CoreError::Internal(_) => "internal_error",
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message())
        .collect::<Vec<_>>()
        .join("; ")
}
