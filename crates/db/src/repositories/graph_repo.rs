//! Snapshot assembly: load one workspace's full graph into the pure
//! [`GraphSnapshot`] type consumed by validation, layout, and planning.

use ideaflow_core::graph::GraphSnapshot;
use ideaflow_core::types::DbId;
use sqlx::PgPool;

use crate::repositories::{ContainerRepo, NodeRepo, PortRepo, ReferenceRepo, WorkspaceRepo};

/// Read-only snapshot loader. Never requires the canvas lock.
pub struct GraphRepo;

impl GraphRepo {
    /// Load the current graph snapshot for a workspace.
    ///
    /// Returns `RowNotFound` when the workspace does not exist.
    pub async fn load_snapshot(
        pool: &PgPool,
        workspace_id: DbId,
    ) -> Result<GraphSnapshot, sqlx::Error> {
        let workspace = WorkspaceRepo::find_by_id(pool, workspace_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let mut snapshot = GraphSnapshot::new(workspace.meta());

        for row in ContainerRepo::list_by_workspace(pool, workspace_id).await? {
            let container = row.to_domain().ok_or_else(|| {
                sqlx::Error::Decode(
                    format!("container {} has unknown state '{}'", row.id, row.state).into(),
                )
            })?;
            snapshot.containers.insert(container.id, container);
        }

        for row in PortRepo::list_by_workspace(pool, workspace_id).await? {
            let port = row.to_domain();
            snapshot.ports.insert(port.id, port);
        }

        for row in NodeRepo::list_by_workspace(pool, workspace_id).await? {
            let node = row.to_domain();
            snapshot.nodes.insert(node.id, node);
        }

        for row in ReferenceRepo::list_by_workspace(pool, workspace_id).await? {
            let reference = row.to_domain();
            snapshot.references.insert(reference.id, reference);
        }

        Ok(snapshot)
    }
}
