//! Execution context and result types.

use ideaflow_core::error::CoreError;
use ideaflow_core::plan::Plan;
use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;

/// Identifies who is executing against which workspace.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext {
    pub workspace_id: DbId,
    pub actor_id: DbId,
}

/// Outcome of a successfully committed plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub workspace_id: DbId,
    pub mutations_applied: usize,
    pub events_emitted: usize,
    pub telemetry_recorded: usize,
    /// Whether the recorded history entry can be rolled back.
    pub is_reversible: bool,
    /// Populated when the plan is irreversible.
    pub irreversibility_reasons: Vec<String>,
    /// Whether the history entry was recorded. A failure here does not undo
    /// the committed plan; it only disables rollback for it.
    pub history_recorded: bool,
    pub executed_at: Timestamp,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    pub workspace_id: DbId,
    /// History entry that was undone and consumed.
    pub plan_id: DbId,
    pub description: String,
    pub mutations_applied: usize,
}

/// Combined result of plan-then-execute.
///
/// Planning and execution results are kept separate so callers can
/// distinguish "nothing happened" from "something happened but a later
/// step failed".
#[derive(Debug)]
pub struct OrchestrationOutcome {
    pub planning: Result<Plan, CoreError>,
    /// `None` when planning failed and execution was never attempted.
    pub execution: Option<Result<ExecutionReport, CoreError>>,
}

impl OrchestrationOutcome {
    /// True when planning and execution both succeeded.
    pub fn is_success(&self) -> bool {
        self.planning.is_ok()
            && matches!(self.execution, Some(Ok(_)))
    }
}
