//! Container model.

use ideaflow_core::graph::{Container, ContainerState, Dimensions, Position};
use ideaflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `containers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContainerRow {
    pub id: DbId,
    pub workspace_id: DbId,
    pub title: String,
    pub body: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f64,
    pub height: f64,
    pub state: String,
    pub parent_container_id: Option<DbId>,
    pub is_auto_generated: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ContainerRow {
    /// Convert into the pure snapshot type.
    ///
    /// Returns `None` when the stored state string is unrecognised; the
    /// schema CHECK constraint makes that unreachable in practice.
    pub fn to_domain(&self) -> Option<Container> {
        Some(Container {
            id: self.id,
            workspace_id: self.workspace_id,
            title: self.title.clone(),
            body: self.body.clone(),
            position: Position {
                x: self.pos_x,
                y: self.pos_y,
            },
            size: Dimensions {
                width: self.width,
                height: self.height,
            },
            state: ContainerState::parse(&self.state)?,
            parent_container_id: self.parent_container_id,
            is_auto_generated: self.is_auto_generated,
        })
    }
}

/// Insert payload for a new container.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContainer {
    pub workspace_id: DbId,
    pub title: String,
    pub body: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub width: f64,
    pub height: f64,
    pub state: ContainerState,
    pub parent_container_id: Option<DbId>,
    pub is_auto_generated: bool,
}
