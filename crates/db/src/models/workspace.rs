//! Workspace model and DTOs.

use ideaflow_core::graph::WorkspaceMeta;
use ideaflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `workspaces` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workspace {
    pub id: DbId,
    pub name: String,
    pub layout_intact: bool,
    pub last_layout_reset_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Workspace {
    /// The pure snapshot view of this workspace's canvas flags.
    pub fn meta(&self) -> WorkspaceMeta {
        WorkspaceMeta {
            id: self.id,
            layout_intact: self.layout_intact,
            last_layout_reset_at: self.last_layout_reset_at,
        }
    }
}

/// DTO for creating a new workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspace {
    pub name: String,
}
