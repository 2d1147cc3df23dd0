//! Container reference model.

use ideaflow_core::graph::ContainerReference;
use ideaflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `container_references` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReferenceRow {
    pub id: DbId,
    pub container_id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub is_primary: bool,
    pub parent_entity_type: Option<String>,
    pub parent_entity_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl ReferenceRow {
    pub fn to_domain(&self) -> ContainerReference {
        ContainerReference {
            id: self.id,
            container_id: self.container_id,
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id,
            is_primary: self.is_primary,
            parent_entity_type: self.parent_entity_type.clone(),
            parent_entity_id: self.parent_entity_id,
        }
    }
}

/// Insert payload for a new reference.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReference {
    pub container_id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub is_primary: bool,
    pub parent_entity_type: Option<String>,
    pub parent_entity_id: Option<DbId>,
}
