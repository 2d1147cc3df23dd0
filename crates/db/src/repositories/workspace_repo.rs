//! Repository for the `workspaces` table.

use ideaflow_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::workspace::{CreateWorkspace, Workspace};

/// Column list for `workspaces` queries.
const COLUMNS: &str = "id, name, layout_intact, last_layout_reset_at, created_at, updated_at";

/// Provides data access for workspaces.
pub struct WorkspaceRepo;

impl WorkspaceRepo {
    /// Create a new workspace with the default-intact layout flag.
    pub async fn create(pool: &PgPool, dto: &CreateWorkspace) -> Result<Workspace, sqlx::Error> {
        let query = format!(
            "INSERT INTO workspaces (name) VALUES ($1) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workspace>(&query)
            .bind(&dto.name)
            .fetch_one(pool)
            .await
    }

    /// Find a workspace by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Workspace>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workspaces WHERE id = $1");
        sqlx::query_as::<_, Workspace>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all workspaces, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Workspace>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workspaces ORDER BY id DESC");
        sqlx::query_as::<_, Workspace>(&query).fetch_all(pool).await
    }

    /// Set the layout flag inside an open transaction.
    ///
    /// `reset_at` is only written on the intact=true transition; breaking
    /// the layout leaves the last reset timestamp untouched.
    pub async fn set_layout_intact(
        conn: &mut PgConnection,
        workspace_id: DbId,
        intact: bool,
        reset_at: Option<Timestamp>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workspaces SET \
                 layout_intact = $2, \
                 last_layout_reset_at = CASE WHEN $2 THEN $3 ELSE last_layout_reset_at END, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(workspace_id)
        .bind(intact)
        .bind(reset_at)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
