//! Telemetry event model.

use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `telemetry_events` table. Write-once.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TelemetryEventRow {
    pub id: DbId,
    pub workspace_id: DbId,
    pub event_kind: String,
    pub occurred_at: Timestamp,
    pub attributes: serde_json::Value,
    pub created_at: Timestamp,
}

/// A per-kind count produced by the aggregation query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct KindCount {
    pub event_kind: String,
    pub count: i64,
}
