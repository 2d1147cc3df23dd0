//! Repository for the `ports` table.

use ideaflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::port::PortRow;

/// Column list for `ports` queries.
const COLUMNS: &str = "id, container_id, created_at";

/// Provides data access for node attachment points.
pub struct PortRepo;

impl PortRepo {
    /// Insert a new port on a container.
    pub async fn insert(
        conn: &mut PgConnection,
        container_id: DbId,
    ) -> Result<PortRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ports (container_id) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PortRow>(&query)
            .bind(container_id)
            .fetch_one(conn)
            .await
    }

    /// Delete a port. Attached nodes cascade.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM ports WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all ports belonging to containers of a workspace.
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<PortRow>, sqlx::Error> {
        let query = format!(
            "SELECT p.id, p.container_id, p.created_at \
             FROM ports p \
             JOIN containers c ON c.id = p.container_id \
             WHERE c.workspace_id = $1 ORDER BY p.id"
        );
        sqlx::query_as::<_, PortRow>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }
}
