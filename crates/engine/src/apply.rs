//! Translation of [`Mutation`]s into SQL inside one open transaction.
//!
//! The match is exhaustive: a mutation kind the engine does not recognize
//! is a compile error, not a runtime guess. The only permitted repair is
//! filling a missing reset timestamp on the intact=true transition;
//! anything else that does not fit current state fails the whole
//! transaction.

use chrono::{DateTime, Utc};
use ideaflow_core::error::CoreError;
use ideaflow_core::plan::{EntityRef, Mutation, SlotMap};
use ideaflow_core::types::DbId;
use sqlx::PgConnection;

use ideaflow_db::models::container::CreateContainer;
use ideaflow_db::models::reference::CreateReference;
use ideaflow_db::repositories::{
    ContainerRepo, NodeRepo, PortRepo, ReferenceRepo, WorkspaceRepo,
};

/// Apply one mutation, binding created ids into `slots`.
pub async fn apply_mutation(
    conn: &mut PgConnection,
    workspace_id: DbId,
    mutation: &Mutation,
    slots: &mut SlotMap,
    now: DateTime<Utc>,
) -> Result<(), CoreError> {
    match mutation {
        Mutation::CreateContainer {
            slot,
            title,
            body,
            position,
            size,
            state,
            parent,
            is_auto_generated,
        } => {
            let parent_container_id = match parent {
                Some(p) => Some(resolve(slots, *p)?),
                None => None,
            };
            let row = ContainerRepo::insert(
                conn,
                &CreateContainer {
                    workspace_id,
                    title: title.clone(),
                    body: body.clone(),
                    pos_x: position.x,
                    pos_y: position.y,
                    width: size.width,
                    height: size.height,
                    state: *state,
                    parent_container_id,
                    is_auto_generated: *is_auto_generated,
                },
            )
            .await
            .map_err(db_err)?;
            slots.bind(*slot, row.id);
            Ok(())
        }
        Mutation::DeleteContainer { container } => {
            let id = resolve(slots, *container)?;
            applied(
                ContainerRepo::delete(conn, id).await.map_err(db_err)?,
                "container",
                id,
            )
        }
        Mutation::MoveContainer { container, to } => {
            let id = resolve(slots, *container)?;
            applied(
                ContainerRepo::update_position(conn, id, to.x, to.y)
                    .await
                    .map_err(db_err)?,
                "container",
                id,
            )
        }
        Mutation::ResizeContainer { container, to } => {
            let id = resolve(slots, *container)?;
            applied(
                ContainerRepo::resize(conn, id, to.width, to.height)
                    .await
                    .map_err(db_err)?,
                "container",
                id,
            )
        }
        Mutation::SetParent { container, parent } => {
            let id = resolve(slots, *container)?;
            let parent_id = match parent {
                Some(p) => Some(resolve(slots, *p)?),
                None => None,
            };
            applied(
                ContainerRepo::set_parent(conn, id, parent_id)
                    .await
                    .map_err(db_err)?,
                "container",
                id,
            )
        }
        Mutation::ActivateContainer {
            container,
            title,
            body,
        } => {
            let id = resolve(slots, *container)?;
            applied(
                ContainerRepo::activate(conn, id, title, body)
                    .await
                    .map_err(db_err)?,
                "ghost container",
                id,
            )
        }
        Mutation::SyncGhostContent { container, title } => {
            let id = resolve(slots, *container)?;
            applied(
                ContainerRepo::sync_content(conn, id, title)
                    .await
                    .map_err(db_err)?,
                "ghost container",
                id,
            )
        }
        Mutation::CreatePort { slot, container } => {
            let container_id = resolve(slots, *container)?;
            let row = PortRepo::insert(conn, container_id).await.map_err(db_err)?;
            slots.bind(*slot, row.id);
            Ok(())
        }
        Mutation::DeletePort { port } => {
            let id = resolve(slots, *port)?;
            applied(PortRepo::delete(conn, id).await.map_err(db_err)?, "port", id)
        }
        Mutation::CreateNode {
            slot,
            from_port,
            to_port,
            source_generated,
        } => {
            let from_id = resolve(slots, *from_port)?;
            let to_id = resolve(slots, *to_port)?;
            let row = NodeRepo::insert(conn, workspace_id, from_id, to_id, *source_generated)
                .await
                .map_err(db_err)?;
            slots.bind(*slot, row.id);
            Ok(())
        }
        Mutation::DeleteNode { node } => {
            let id = resolve(slots, *node)?;
            applied(NodeRepo::delete(conn, id).await.map_err(db_err)?, "node", id)
        }
        Mutation::CreateReference {
            slot,
            container,
            entity_type,
            entity_id,
            is_primary,
            parent_entity_type,
            parent_entity_id,
        } => {
            let container_id = resolve(slots, *container)?;
            let row = ReferenceRepo::insert(
                conn,
                &CreateReference {
                    container_id,
                    entity_type: entity_type.clone(),
                    entity_id: *entity_id,
                    is_primary: *is_primary,
                    parent_entity_type: parent_entity_type.clone(),
                    parent_entity_id: *parent_entity_id,
                },
            )
            .await
            .map_err(db_err)?;
            slots.bind(*slot, row.id);
            Ok(())
        }
        Mutation::DeleteReference { reference } => {
            let id = resolve(slots, *reference)?;
            applied(
                ReferenceRepo::delete(conn, id).await.map_err(db_err)?,
                "reference",
                id,
            )
        }
        Mutation::SetPrimaryReference {
            container,
            reference,
        } => {
            let container_id = resolve(slots, *container)?;
            let reference_id = resolve(slots, *reference)?;
            applied(
                ReferenceRepo::set_primary(conn, container_id, reference_id)
                    .await
                    .map_err(db_err)?,
                "reference",
                reference_id,
            )
        }
        Mutation::SetReferenceParent {
            reference,
            parent_entity_type,
            parent_entity_id,
        } => {
            let id = resolve(slots, *reference)?;
            applied(
                ReferenceRepo::set_parent(
                    conn,
                    id,
                    parent_entity_type.as_deref(),
                    *parent_entity_id,
                )
                .await
                .map_err(db_err)?,
                "reference",
                id,
            )
        }
        Mutation::SetLayoutIntact { intact, reset_at } => {
            // Whitelisted repair: an intact=true transition with no
            // timestamp gets the commit time.
            let reset_at = if *intact {
                Some(reset_at.unwrap_or(now))
            } else {
                None
            };
            applied(
                WorkspaceRepo::set_layout_intact(conn, workspace_id, *intact, reset_at)
                    .await
                    .map_err(db_err)?,
                "workspace",
                workspace_id,
            )
        }
    }
}

fn resolve(slots: &SlotMap, entity_ref: EntityRef) -> Result<DbId, CoreError> {
    slots.resolve(entity_ref).ok_or_else(|| {
        CoreError::Execution(format!("unresolved plan reference {entity_ref:?}"))
    })
}

fn applied(changed: bool, what: &str, id: DbId) -> Result<(), CoreError> {
    if changed {
        Ok(())
    } else {
        Err(CoreError::Execution(format!(
            "{what} {id} was not in the expected state"
        )))
    }
}

fn db_err(err: sqlx::Error) -> CoreError {
    CoreError::Execution(err.to_string())
}
