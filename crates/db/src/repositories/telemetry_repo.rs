//! Repository for the `telemetry_events` table.
//!
//! Append-only: there are deliberately no update or delete methods.

use ideaflow_core::telemetry::TelemetryRecord;
use ideaflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::telemetry::{KindCount, TelemetryEventRow};

/// Column list for `telemetry_events` queries.
const COLUMNS: &str = "id, workspace_id, event_kind, occurred_at, attributes, created_at";

/// Provides append and read access for sanitized telemetry.
pub struct TelemetryRepo;

impl TelemetryRepo {
    /// Append a firewall-approved record.
    pub async fn append(
        pool: &PgPool,
        record: &TelemetryRecord,
    ) -> Result<TelemetryEventRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO telemetry_events (workspace_id, event_kind, occurred_at, attributes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TelemetryEventRow>(&query)
            .bind(record.workspace_id)
            .bind(&record.event_kind)
            .bind(record.occurred_at)
            .bind(&record.attributes)
            .fetch_one(pool)
            .await
    }

    /// Most recent records for a workspace.
    pub async fn recent(
        pool: &PgPool,
        workspace_id: DbId,
        limit: i64,
    ) -> Result<Vec<TelemetryEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM telemetry_events \
             WHERE workspace_id = $1 ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, TelemetryEventRow>(&query)
            .bind(workspace_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Descriptive per-kind counts for a workspace.
    pub async fn counts_by_kind(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<KindCount>, sqlx::Error> {
        sqlx::query_as::<_, KindCount>(
            "SELECT event_kind, COUNT(*) AS count \
             FROM telemetry_events \
             WHERE workspace_id = $1 \
             GROUP BY event_kind ORDER BY event_kind",
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await
    }
}
