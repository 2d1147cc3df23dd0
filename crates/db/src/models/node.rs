//! Node (graph edge) model.

use ideaflow_core::graph::NodeEdge;
use ideaflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `nodes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeRow {
    pub id: DbId,
    pub workspace_id: DbId,
    pub from_port_id: DbId,
    pub to_port_id: DbId,
    pub source_generated: bool,
    pub created_at: Timestamp,
}

impl NodeRow {
    pub fn to_domain(&self) -> NodeEdge {
        NodeEdge {
            id: self.id,
            workspace_id: self.workspace_id,
            from_port_id: self.from_port_id,
            to_port_id: self.to_port_id,
            source_generated: self.source_generated,
        }
    }
}
