//! Repository for the `stored_plans` table.
//!
//! A fixed-capacity ring per workspace: pushing a new entry evicts the
//! oldest beyond the capacity inside the same transaction, so readers never
//! observe more than the last three plans.

use ideaflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::stored_plan::{NewStoredPlan, StoredPlan};

/// How many executed plans are kept per workspace.
pub const HISTORY_CAPACITY: i64 = 3;

/// Column list for `stored_plans` queries.
const COLUMNS: &str = "\
    id, workspace_id, description, mutations_json, inverse_json, \
    is_reversible, irreversibility_reasons, executed_by, executed_at";

/// Provides data access for the bounded plan history.
pub struct StoredPlanRepo;

impl StoredPlanRepo {
    /// Record an executed plan and evict beyond the ring capacity.
    pub async fn push(pool: &PgPool, entry: &NewStoredPlan) -> Result<StoredPlan, sqlx::Error> {
        let mutations_json =
            serde_json::to_value(&entry.mutations).map_err(|e| sqlx::Error::Encode(e.into()))?;
        let inverse_json = serde_json::to_value(&entry.inverse.mutations)
            .map_err(|e| sqlx::Error::Encode(e.into()))?;
        let reasons_json = serde_json::to_value(&entry.inverse.reasons)
            .map_err(|e| sqlx::Error::Encode(e.into()))?;

        let mut tx = pool.begin().await?;

        let insert_query = format!(
            "INSERT INTO stored_plans \
                 (workspace_id, description, mutations_json, inverse_json, \
                  is_reversible, irreversibility_reasons, executed_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        let stored = sqlx::query_as::<_, StoredPlan>(&insert_query)
            .bind(entry.workspace_id)
            .bind(&entry.description)
            .bind(mutations_json)
            .bind(inverse_json)
            .bind(entry.inverse.is_reversible)
            .bind(reasons_json)
            .bind(entry.executed_by)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "DELETE FROM stored_plans \
             WHERE workspace_id = $1 AND id NOT IN ( \
                 SELECT id FROM stored_plans \
                 WHERE workspace_id = $1 ORDER BY id DESC LIMIT $2)",
        )
        .bind(entry.workspace_id)
        .bind(HISTORY_CAPACITY)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    /// The most recently executed plan for a workspace.
    pub async fn latest(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Option<StoredPlan>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stored_plans \
             WHERE workspace_id = $1 ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, StoredPlan>(&query)
            .bind(workspace_id)
            .fetch_optional(pool)
            .await
    }

    /// All retained history entries, newest first.
    pub async fn list(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<StoredPlan>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM stored_plans \
             WHERE workspace_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, StoredPlan>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }

    /// Remove a consumed history entry (after a successful rollback).
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM stored_plans WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
