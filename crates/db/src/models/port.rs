//! Port model.

use ideaflow_core::graph::Port;
use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `ports` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PortRow {
    pub id: DbId,
    pub container_id: DbId,
    pub created_at: Timestamp,
}

impl PortRow {
    pub fn to_domain(&self) -> Port {
        Port {
            id: self.id,
            container_id: self.container_id,
        }
    }
}
