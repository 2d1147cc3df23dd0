//! Repository for the `containers` table.
//!
//! The mutation methods take `&mut PgConnection` so the execution engine
//! can drive them inside a single transaction; reads take `&PgPool`.

use ideaflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::container::{ContainerRow, CreateContainer};

/// Column list for `containers` queries.
const COLUMNS: &str = "\
    id, workspace_id, title, body, pos_x, pos_y, width, height, \
    state, parent_container_id, is_auto_generated, created_at, updated_at";

/// Provides data access for canvas containers.
pub struct ContainerRepo;

impl ContainerRepo {
    /// Insert a new container.
    pub async fn insert(
        conn: &mut PgConnection,
        dto: &CreateContainer,
    ) -> Result<ContainerRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO containers \
                 (workspace_id, title, body, pos_x, pos_y, width, height, \
                  state, parent_container_id, is_auto_generated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContainerRow>(&query)
            .bind(dto.workspace_id)
            .bind(&dto.title)
            .bind(&dto.body)
            .bind(dto.pos_x)
            .bind(dto.pos_y)
            .bind(dto.width)
            .bind(dto.height)
            .bind(dto.state.as_str())
            .bind(dto.parent_container_id)
            .bind(dto.is_auto_generated)
            .fetch_one(conn)
            .await
    }

    /// Move a container. Returns `false` if the row is gone.
    pub async fn update_position(
        conn: &mut PgConnection,
        id: DbId,
        x: f64,
        y: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE containers SET pos_x = $2, pos_y = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(x)
        .bind(y)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resize a container.
    pub async fn resize(
        conn: &mut PgConnection,
        id: DbId,
        width: f64,
        height: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE containers SET width = $2, height = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(width)
        .bind(height)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Re-parent a container (`NULL` unnests).
    pub async fn set_parent(
        conn: &mut PgConnection,
        id: DbId,
        parent_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE containers SET parent_container_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(parent_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote a ghost to active, installing its initial content.
    ///
    /// The WHERE clause refuses to touch an already-active row, so the
    /// one-way transition holds even under races.
    pub async fn activate(
        conn: &mut PgConnection,
        id: DbId,
        title: &str,
        body: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE containers SET state = 'active', title = $2, body = $3, updated_at = NOW() \
             WHERE id = $1 AND state = 'ghost'",
        )
        .bind(id)
        .bind(title)
        .bind(body)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mirror-path title refresh; only ghosts accept it.
    pub async fn sync_content(
        conn: &mut PgConnection,
        id: DbId,
        title: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE containers SET title = $2, updated_at = NOW() \
             WHERE id = $1 AND state = 'ghost'",
        )
        .bind(id)
        .bind(title)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a container. Ports, nodes, and references cascade; children
    /// are unparented by the schema.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM containers WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a single container by ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ContainerRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM containers WHERE id = $1");
        sqlx::query_as::<_, ContainerRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all containers in a workspace.
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<ContainerRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM containers WHERE workspace_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, ContainerRow>(&query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }
}
