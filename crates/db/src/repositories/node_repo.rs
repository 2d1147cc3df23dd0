//! Repository for the `nodes` table (graph edges).

use ideaflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::node::NodeRow;

/// Column list for `nodes` queries.
const COLUMNS: &str = "id, workspace_id, from_port_id, to_port_id, source_generated, created_at";

/// Provides data access for nodes.
pub struct NodeRepo;

impl NodeRepo {
    /// Insert a new node between two ports.
    pub async fn insert(
        conn: &mut PgConnection,
        workspace_id: DbId,
        from_port_id: DbId,
        to_port_id: DbId,
        source_generated: bool,
    ) -> Result<NodeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO nodes (workspace_id, from_port_id, to_port_id, source_generated) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(workspace_id)
            .bind(from_port_id)
            .bind(to_port_id)
            .bind(source_generated)
            .fetch_one(conn)
            .await
    }

    /// Delete a node by ID.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a single node by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<NodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM nodes WHERE id = $1");
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all nodes in a workspace.
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<NodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM nodes WHERE workspace_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, NodeRow>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }
}
