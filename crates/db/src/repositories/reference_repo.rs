//! Repository for the `container_references` table.

use ideaflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::reference::{CreateReference, ReferenceRow};

/// Column list for `container_references` queries.
const COLUMNS: &str = "\
    id, container_id, entity_type, entity_id, is_primary, \
    parent_entity_type, parent_entity_id, created_at";

/// Provides data access for external entity references.
pub struct ReferenceRepo;

impl ReferenceRepo {
    /// Insert a new reference.
    pub async fn insert(
        conn: &mut PgConnection,
        dto: &CreateReference,
    ) -> Result<ReferenceRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO container_references \
                 (container_id, entity_type, entity_id, is_primary, \
                  parent_entity_type, parent_entity_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReferenceRow>(&query)
            .bind(dto.container_id)
            .bind(&dto.entity_type)
            .bind(dto.entity_id)
            .bind(dto.is_primary)
            .bind(&dto.parent_entity_type)
            .bind(dto.parent_entity_id)
            .fetch_one(conn)
            .await
    }

    /// Delete a reference by ID. Never touches the external entity.
    pub async fn delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM container_references WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Make one reference the container's primary, demoting the others.
    ///
    /// Two statements so the partial unique index never sees a moment with
    /// two primaries.
    pub async fn set_primary(
        conn: &mut PgConnection,
        container_id: DbId,
        reference_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            "UPDATE container_references SET is_primary = FALSE \
             WHERE container_id = $1 AND is_primary",
        )
        .bind(container_id)
        .execute(&mut *conn)
        .await?;

        let result = sqlx::query(
            "UPDATE container_references SET is_primary = TRUE \
             WHERE id = $1 AND container_id = $2",
        )
        .bind(reference_id)
        .bind(container_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Update the recorded hierarchy position of the mirrored entity.
    pub async fn set_parent(
        conn: &mut PgConnection,
        id: DbId,
        parent_entity_type: Option<&str>,
        parent_entity_id: Option<DbId>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE container_references \
             SET parent_entity_type = $2, parent_entity_id = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(parent_entity_type)
        .bind(parent_entity_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List all references carried by containers of a workspace.
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<Vec<ReferenceRow>, sqlx::Error> {
        let query = "SELECT r.id, r.container_id, r.entity_type, r.entity_id, r.is_primary, \
                            r.parent_entity_type, r.parent_entity_id, r.created_at \
                     FROM container_references r \
                     JOIN containers c ON c.id = r.container_id \
                     WHERE c.workspace_id = $1 ORDER BY r.id";
        sqlx::query_as::<_, ReferenceRow>(query)
            .bind(workspace_id)
            .fetch_all(pool)
            .await
    }
}
