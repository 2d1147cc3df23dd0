//! Plans, mutations, and inverse computation (PRD-24).
//!
//! A [`Plan`] is an ordered list of [`Mutation`]s produced by planning and
//! not yet applied. Mutations that create entities carry a plan-local `slot`
//! handle; later mutations in the same plan address them through
//! [`EntityRef::Planned`]. The execution engine resolves slots to real
//! database ids as rows are inserted.
//!
//! [`shadow_apply`] applies a mutation to an in-memory snapshot. It backs
//! sequential plan validation, inverse computation, and the round-trip
//! tests, and never performs I/O.

use serde::{Deserialize, Serialize};

use crate::graph::{
    Container, ContainerReference, ContainerState, Dimensions, GraphSnapshot, NodeEdge, Port,
    Position,
};
use crate::telemetry::BehavioralEventKind;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

/// Reference to an entity that either already exists or is created earlier
/// in the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ref", rename_all = "snake_case")]
pub enum EntityRef {
    /// A persisted entity addressed by database id.
    Existing { id: DbId },
    /// An entity created by an earlier mutation in the same plan.
    Planned { slot: u32 },
}

impl EntityRef {
    pub fn existing(id: DbId) -> Self {
        EntityRef::Existing { id }
    }

    pub fn planned(slot: u32) -> Self {
        EntityRef::Planned { slot }
    }
}

/// Maps plan-local slots to concrete ids as creates are applied.
///
/// The shadow apply allocates synthetic negative ids so that planned
/// entities can be addressed in a snapshot that never touched the database;
/// the execution engine fills in real BIGSERIAL ids instead.
#[derive(Debug, Clone)]
pub struct SlotMap {
    entries: std::collections::BTreeMap<u32, DbId>,
    next_synthetic: DbId,
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotMap {
    pub fn new() -> Self {
        Self {
            entries: Default::default(),
            next_synthetic: -1,
        }
    }

    /// Record the concrete id for a slot.
    pub fn bind(&mut self, slot: u32, id: DbId) {
        self.entries.insert(slot, id);
    }

    /// Allocate a synthetic (negative) id for a slot.
    pub fn bind_synthetic(&mut self, slot: u32) -> DbId {
        let id = self.next_synthetic;
        self.next_synthetic -= 1;
        self.entries.insert(slot, id);
        id
    }

    pub fn resolve(&self, entity_ref: EntityRef) -> Option<DbId> {
        match entity_ref {
            EntityRef::Existing { id } => Some(id),
            EntityRef::Planned { slot } => self.entries.get(&slot).copied(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// A single atomic change to the persisted graph.
///
/// The set is closed: the execution engine matches exhaustively and fails
/// loudly on anything it does not recognize, rather than guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    CreateContainer {
        slot: u32,
        title: String,
        body: String,
        position: Position,
        size: Dimensions,
        state: ContainerState,
        parent: Option<EntityRef>,
        is_auto_generated: bool,
    },
    DeleteContainer {
        container: EntityRef,
    },
    MoveContainer {
        container: EntityRef,
        to: Position,
    },
    ResizeContainer {
        container: EntityRef,
        to: Dimensions,
    },
    SetParent {
        container: EntityRef,
        parent: Option<EntityRef>,
    },
    ActivateContainer {
        container: EntityRef,
        title: String,
        body: String,
    },
    /// Mirror-path content refresh for ghosts; rejected on active containers.
    SyncGhostContent {
        container: EntityRef,
        title: String,
    },
    CreatePort {
        slot: u32,
        container: EntityRef,
    },
    DeletePort {
        port: EntityRef,
    },
    CreateNode {
        slot: u32,
        from_port: EntityRef,
        to_port: EntityRef,
        source_generated: bool,
    },
    DeleteNode {
        node: EntityRef,
    },
    CreateReference {
        slot: u32,
        container: EntityRef,
        entity_type: String,
        entity_id: DbId,
        is_primary: bool,
        parent_entity_type: Option<String>,
        parent_entity_id: Option<DbId>,
    },
    DeleteReference {
        reference: EntityRef,
    },
    SetPrimaryReference {
        container: EntityRef,
        reference: EntityRef,
    },
    SetReferenceParent {
        reference: EntityRef,
        parent_entity_type: Option<String>,
        parent_entity_id: Option<DbId>,
    },
    /// `reset_at = None` on an intact=true transition is filled with the
    /// commit timestamp by the execution engine (whitelisted repair).
    SetLayoutIntact {
        intact: bool,
        reset_at: Option<Timestamp>,
    },
}

impl Mutation {
    /// Short lowercase tag used in descriptions and tracing.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Mutation::CreateContainer { .. } => "create_container",
            Mutation::DeleteContainer { .. } => "delete_container",
            Mutation::MoveContainer { .. } => "move_container",
            Mutation::ResizeContainer { .. } => "resize_container",
            Mutation::SetParent { .. } => "set_parent",
            Mutation::ActivateContainer { .. } => "activate_container",
            Mutation::SyncGhostContent { .. } => "sync_ghost_content",
            Mutation::CreatePort { .. } => "create_port",
            Mutation::DeletePort { .. } => "delete_port",
            Mutation::CreateNode { .. } => "create_node",
            Mutation::DeleteNode { .. } => "delete_node",
            Mutation::CreateReference { .. } => "create_reference",
            Mutation::DeleteReference { .. } => "delete_reference",
            Mutation::SetPrimaryReference { .. } => "set_primary_reference",
            Mutation::SetReferenceParent { .. } => "set_reference_parent",
            Mutation::SetLayoutIntact { .. } => "set_layout_intact",
        }
    }
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// An ordered list of mutations plus the behavioral events to emit once the
/// whole list has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub workspace_id: DbId,
    pub description: String,
    pub mutations: Vec<Mutation>,
    pub events: Vec<BehavioralEventKind>,
}

/// The recorded inverse of an executed plan.
///
/// When any forward mutation is irreversible the whole plan is flagged
/// irreversible and no inverse mutations are recorded; a partial inverse
/// would silently restore a state that never existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InversePlan {
    pub mutations: Vec<Mutation>,
    pub is_reversible: bool,
    pub reasons: Vec<String>,
}

// ---------------------------------------------------------------------------
// Shadow apply
// ---------------------------------------------------------------------------

/// Apply one mutation to an in-memory snapshot.
///
/// Returns a message describing the failure when the mutation does not fit
/// the snapshot (unknown id, unresolved slot). Invariant checking is the
/// validation module's job; this function only maintains structure.
pub fn shadow_apply(
    snapshot: &mut GraphSnapshot,
    mutation: &Mutation,
    slots: &mut SlotMap,
) -> Result<(), String> {
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
            let parent_id = match parent {
                Some(p) => Some(
                    slots
                        .resolve(*p)
                        .ok_or_else(|| format!("unresolved parent ref {p:?}"))?,
                ),
                None => None,
            };
            let id = slots.bind_synthetic(*slot);
            snapshot.containers.insert(
                id,
                Container {
                    id,
                    workspace_id: snapshot.workspace.id,
                    title: title.clone(),
                    body: body.clone(),
                    position: *position,
                    size: *size,
                    state: *state,
                    parent_container_id: parent_id,
                    is_auto_generated: *is_auto_generated,
                },
            );
            Ok(())
        }
        Mutation::DeleteContainer { container } => {
            let id = resolve(slots, *container, "container")?;
            snapshot
                .containers
                .remove(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            // Cascade exactly as the schema does: ports, their nodes, and
            // references go with the container.
            let port_ids: Vec<DbId> = snapshot
                .ports
                .values()
                .filter(|p| p.container_id == id)
                .map(|p| p.id)
                .collect();
            snapshot
                .nodes
                .retain(|_, n| !port_ids.contains(&n.from_port_id) && !port_ids.contains(&n.to_port_id));
            snapshot.ports.retain(|_, p| p.container_id != id);
            snapshot.references.retain(|_, r| r.container_id != id);
            // Children are kept but unparented (ON DELETE SET NULL).
            for c in snapshot.containers.values_mut() {
                if c.parent_container_id == Some(id) {
                    c.parent_container_id = None;
                }
            }
            Ok(())
        }
        Mutation::MoveContainer { container, to } => {
            let id = resolve(slots, *container, "container")?;
            let c = snapshot
                .containers
                .get_mut(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            c.position = *to;
            Ok(())
        }
        Mutation::ResizeContainer { container, to } => {
            let id = resolve(slots, *container, "container")?;
            let c = snapshot
                .containers
                .get_mut(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            c.size = *to;
            Ok(())
        }
        Mutation::SetParent { container, parent } => {
            let id = resolve(slots, *container, "container")?;
            let parent_id = match parent {
                Some(p) => Some(resolve(slots, *p, "parent container")?),
                None => None,
            };
            let c = snapshot
                .containers
                .get_mut(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            c.parent_container_id = parent_id;
            Ok(())
        }
        Mutation::ActivateContainer {
            container,
            title,
            body,
        } => {
            let id = resolve(slots, *container, "container")?;
            let c = snapshot
                .containers
                .get_mut(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            c.state = ContainerState::Active;
            c.title = title.clone();
            c.body = body.clone();
            Ok(())
        }
        Mutation::SyncGhostContent { container, title } => {
            let id = resolve(slots, *container, "container")?;
            let c = snapshot
                .containers
                .get_mut(&id)
                .ok_or_else(|| format!("container {id} not in snapshot"))?;
            c.title = title.clone();
            Ok(())
        }
        Mutation::CreatePort { slot, container } => {
            let container_id = resolve(slots, *container, "container")?;
            let id = slots.bind_synthetic(*slot);
            snapshot.ports.insert(id, Port { id, container_id });
            Ok(())
        }
        Mutation::DeletePort { port } => {
            let id = resolve(slots, *port, "port")?;
            snapshot
                .ports
                .remove(&id)
                .ok_or_else(|| format!("port {id} not in snapshot"))?;
            snapshot
                .nodes
                .retain(|_, n| n.from_port_id != id && n.to_port_id != id);
            Ok(())
        }
        Mutation::CreateNode {
            slot,
            from_port,
            to_port,
            source_generated,
        } => {
            let from_port_id = resolve(slots, *from_port, "port")?;
            let to_port_id = resolve(slots, *to_port, "port")?;
            let id = slots.bind_synthetic(*slot);
            snapshot.nodes.insert(
                id,
                NodeEdge {
                    id,
                    workspace_id: snapshot.workspace.id,
                    from_port_id,
                    to_port_id,
                    source_generated: *source_generated,
                },
            );
            Ok(())
        }
        Mutation::DeleteNode { node } => {
            let id = resolve(slots, *node, "node")?;
            snapshot
                .nodes
                .remove(&id)
                .ok_or_else(|| format!("node {id} not in snapshot"))?;
            Ok(())
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
            let container_id = resolve(slots, *container, "container")?;
            let id = slots.bind_synthetic(*slot);
            snapshot.references.insert(
                id,
                ContainerReference {
                    id,
                    container_id,
                    entity_type: entity_type.clone(),
                    entity_id: *entity_id,
                    is_primary: *is_primary,
                    parent_entity_type: parent_entity_type.clone(),
                    parent_entity_id: *parent_entity_id,
                },
            );
            Ok(())
        }
        Mutation::DeleteReference { reference } => {
            let id = resolve(slots, *reference, "reference")?;
            snapshot
                .references
                .remove(&id)
                .ok_or_else(|| format!("reference {id} not in snapshot"))?;
            Ok(())
        }
        Mutation::SetPrimaryReference {
            container,
            reference,
        } => {
            let container_id = resolve(slots, *container, "container")?;
            let reference_id = resolve(slots, *reference, "reference")?;
            let mut found = false;
            for r in snapshot.references.values_mut() {
                if r.container_id == container_id {
                    r.is_primary = r.id == reference_id;
                    found |= r.id == reference_id;
                }
            }
            if found {
                Ok(())
            } else {
                Err(format!(
                    "reference {reference_id} not carried by container {container_id}"
                ))
            }
        }
        Mutation::SetReferenceParent {
            reference,
            parent_entity_type,
            parent_entity_id,
        } => {
            let id = resolve(slots, *reference, "reference")?;
            let r = snapshot
                .references
                .get_mut(&id)
                .ok_or_else(|| format!("reference {id} not in snapshot"))?;
            r.parent_entity_type = parent_entity_type.clone();
            r.parent_entity_id = *parent_entity_id;
            Ok(())
        }
        Mutation::SetLayoutIntact { intact, reset_at } => {
            snapshot.workspace.layout_intact = *intact;
            if *intact {
                snapshot.workspace.last_layout_reset_at = *reset_at;
            }
            Ok(())
        }
    }
}

fn resolve(slots: &SlotMap, entity_ref: EntityRef, what: &str) -> Result<DbId, String> {
    slots
        .resolve(entity_ref)
        .ok_or_else(|| format!("unresolved {what} ref {entity_ref:?}"))
}

// ---------------------------------------------------------------------------
// Inverse computation
// ---------------------------------------------------------------------------

/// Compute the inverse of a plan against the snapshot it will run on.
///
/// Walks mutations in order against an evolving shadow copy so that a later
/// mutation's inverse captures the state produced by earlier ones, then
/// reverses the collected list.
pub fn invert_plan(plan: &Plan, pre_state: &GraphSnapshot) -> InversePlan {
    let mut shadow = pre_state.clone();
    let mut slots = SlotMap::new();
    let mut inverse: Vec<Mutation> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();
    // Slots for entities the inverse itself recreates.
    let mut inverse_slot: u32 = 1000;

    for mutation in &plan.mutations {
        match invert_mutation(mutation, &shadow, &slots, &mut inverse_slot) {
            Ok(inv) => inverse.extend(inv),
            Err(reason) => reasons.push(reason),
        }
        // Keep the shadow in step even past irreversible mutations so the
        // remaining inverses are computed against the right state.
        if let Err(err) = shadow_apply(&mut shadow, mutation, &mut slots) {
            reasons.push(format!("inverse tracking failed: {err}"));
        }
    }

    if reasons.is_empty() {
        inverse.reverse();
        InversePlan {
            mutations: inverse,
            is_reversible: true,
            reasons,
        }
    } else {
        InversePlan {
            mutations: Vec::new(),
            is_reversible: false,
            reasons,
        }
    }
}

/// Invert a single mutation against the snapshot state just before it runs.
///
/// Returns the mutations undoing it, or the reason it cannot be undone.
fn invert_mutation(
    mutation: &Mutation,
    before: &GraphSnapshot,
    slots: &SlotMap,
    inverse_slot: &mut u32,
) -> Result<Vec<Mutation>, String> {
    match mutation {
        Mutation::CreateContainer { slot, .. } => Ok(vec![Mutation::DeleteContainer {
            container: EntityRef::planned(*slot),
        }]),
        Mutation::DeleteContainer { container } => Err(format!(
            "{}: container deletion cascades to ports, nodes, and references",
            describe_ref(*container)
        )),
        Mutation::MoveContainer { container, .. } => {
            let c = lookup_container(before, slots, *container)?;
            Ok(vec![Mutation::MoveContainer {
                container: *container,
                to: c.position,
            }])
        }
        Mutation::ResizeContainer { container, .. } => {
            let c = lookup_container(before, slots, *container)?;
            Ok(vec![Mutation::ResizeContainer {
                container: *container,
                to: c.size,
            }])
        }
        Mutation::SetParent { container, .. } => {
            let c = lookup_container(before, slots, *container)?;
            Ok(vec![Mutation::SetParent {
                container: *container,
                parent: c.parent_container_id.map(EntityRef::existing),
            }])
        }
        Mutation::ActivateContainer { container, .. } => Err(format!(
            "{}: activation is one-way",
            describe_ref(*container)
        )),
        Mutation::SyncGhostContent { container, .. } => {
            let c = lookup_container(before, slots, *container)?;
            Ok(vec![Mutation::SyncGhostContent {
                container: *container,
                title: c.title.clone(),
            }])
        }
        Mutation::CreatePort { slot, .. } => Ok(vec![Mutation::DeletePort {
            port: EntityRef::planned(*slot),
        }]),
        Mutation::DeletePort { port } => {
            let id = slots
                .resolve(*port)
                .ok_or_else(|| format!("unresolved port ref {port:?}"))?;
            let p = before
                .port(id)
                .ok_or_else(|| format!("port {id} not in snapshot"))?;
            if before
                .nodes
                .values()
                .any(|n| n.from_port_id == id || n.to_port_id == id)
            {
                return Err(format!("port {id}: deletion cascades to attached nodes"));
            }
            let slot = next_slot(inverse_slot);
            Ok(vec![Mutation::CreatePort {
                slot,
                container: EntityRef::existing(p.container_id),
            }])
        }
        Mutation::CreateNode { slot, .. } => Ok(vec![Mutation::DeleteNode {
            node: EntityRef::planned(*slot),
        }]),
        Mutation::DeleteNode { node } => {
            let id = slots
                .resolve(*node)
                .ok_or_else(|| format!("unresolved node ref {node:?}"))?;
            let n = before
                .node(id)
                .ok_or_else(|| format!("node {id} not in snapshot"))?;
            let slot = next_slot(inverse_slot);
            Ok(vec![Mutation::CreateNode {
                slot,
                from_port: EntityRef::existing(n.from_port_id),
                to_port: EntityRef::existing(n.to_port_id),
                source_generated: n.source_generated,
            }])
        }
        Mutation::CreateReference { slot, .. } => Ok(vec![Mutation::DeleteReference {
            reference: EntityRef::planned(*slot),
        }]),
        Mutation::DeleteReference { reference } => {
            let id = slots
                .resolve(*reference)
                .ok_or_else(|| format!("unresolved reference ref {reference:?}"))?;
            let r = before
                .reference(id)
                .ok_or_else(|| format!("reference {id} not in snapshot"))?;
            let slot = next_slot(inverse_slot);
            Ok(vec![Mutation::CreateReference {
                slot,
                container: EntityRef::existing(r.container_id),
                entity_type: r.entity_type.clone(),
                entity_id: r.entity_id,
                is_primary: r.is_primary,
                parent_entity_type: r.parent_entity_type.clone(),
                parent_entity_id: r.parent_entity_id,
            }])
        }
        Mutation::SetPrimaryReference { container, .. } => {
            let container_id = slots
                .resolve(*container)
                .ok_or_else(|| format!("unresolved container ref {container:?}"))?;
            match before.primary_reference_of(container_id) {
                Some(prior) => Ok(vec![Mutation::SetPrimaryReference {
                    container: *container,
                    reference: EntityRef::existing(prior.id),
                }]),
                None => Err(format!(
                    "container {container_id}: no prior primary reference to restore"
                )),
            }
        }
        Mutation::SetReferenceParent { reference, .. } => {
            let id = slots
                .resolve(*reference)
                .ok_or_else(|| format!("unresolved reference ref {reference:?}"))?;
            let r = before
                .reference(id)
                .ok_or_else(|| format!("reference {id} not in snapshot"))?;
            Ok(vec![Mutation::SetReferenceParent {
                reference: *reference,
                parent_entity_type: r.parent_entity_type.clone(),
                parent_entity_id: r.parent_entity_id,
            }])
        }
        Mutation::SetLayoutIntact { .. } => Ok(vec![Mutation::SetLayoutIntact {
            intact: before.workspace.layout_intact,
            reset_at: before.workspace.last_layout_reset_at,
        }]),
    }
}

/// Rewrite resolvable [`EntityRef::Planned`] refs to concrete ids.
///
/// Used on a recorded inverse after execution: slots bound during the
/// forward apply become real ids, while slots the inverse itself creates
/// (recreate mutations) stay planned and are bound at rollback time.
pub fn resolve_planned_refs(mutations: &mut [Mutation], slots: &SlotMap) {
    let fix = |entity_ref: &mut EntityRef| {
        if let EntityRef::Planned { slot } = entity_ref {
            if let Some(id) = slots.resolve(EntityRef::Planned { slot: *slot }) {
                *entity_ref = EntityRef::Existing { id };
            }
        }
    };

    for mutation in mutations {
        match mutation {
            Mutation::CreateContainer { parent, .. } => {
                if let Some(parent) = parent {
                    fix(parent);
                }
            }
            Mutation::DeleteContainer { container }
            | Mutation::MoveContainer { container, .. }
            | Mutation::ResizeContainer { container, .. }
            | Mutation::ActivateContainer { container, .. }
            | Mutation::SyncGhostContent { container, .. }
            | Mutation::CreatePort { container, .. }
            | Mutation::CreateReference { container, .. } => fix(container),
            Mutation::SetParent { container, parent } => {
                fix(container);
                if let Some(parent) = parent {
                    fix(parent);
                }
            }
            Mutation::DeletePort { port } => fix(port),
            Mutation::CreateNode {
                from_port, to_port, ..
            } => {
                fix(from_port);
                fix(to_port);
            }
            Mutation::DeleteNode { node } => fix(node),
            Mutation::DeleteReference { reference }
            | Mutation::SetReferenceParent { reference, .. } => fix(reference),
            Mutation::SetPrimaryReference {
                container,
                reference,
            } => {
                fix(container);
                fix(reference);
            }
            Mutation::SetLayoutIntact { .. } => {}
        }
    }
}

fn lookup_container<'a>(
    snapshot: &'a GraphSnapshot,
    slots: &SlotMap,
    entity_ref: EntityRef,
) -> Result<&'a Container, String> {
    let id = slots
        .resolve(entity_ref)
        .ok_or_else(|| format!("unresolved container ref {entity_ref:?}"))?;
    snapshot
        .container(id)
        .ok_or_else(|| format!("container {id} not in snapshot"))
}

fn describe_ref(entity_ref: EntityRef) -> String {
    match entity_ref {
        EntityRef::Existing { id } => format!("container {id}"),
        EntityRef::Planned { slot } => format!("planned container #{slot}"),
    }
}

fn next_slot(counter: &mut u32) -> u32 {
    let slot = *counter;
    *counter += 1;
    slot
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WorkspaceMeta;

    fn workspace() -> WorkspaceMeta {
        WorkspaceMeta {
            id: 1,
            layout_intact: true,
            last_layout_reset_at: None,
        }
    }

    fn container(id: DbId) -> Container {
        Container {
            id,
            workspace_id: 1,
            title: format!("container {id}"),
            body: String::new(),
            position: Position { x: 10.0, y: 20.0 },
            size: Dimensions {
                width: 200.0,
                height: 100.0,
            },
            state: ContainerState::Active,
            parent_container_id: None,
            is_auto_generated: false,
        }
    }

    fn base_snapshot() -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::new(workspace());
        snapshot.containers.insert(1, container(1));
        snapshot.containers.insert(2, container(2));
        snapshot.ports.insert(
            10,
            Port {
                id: 10,
                container_id: 1,
            },
        );
        snapshot.ports.insert(
            11,
            Port {
                id: 11,
                container_id: 2,
            },
        );
        snapshot
    }

    fn plan(mutations: Vec<Mutation>) -> Plan {
        Plan {
            workspace_id: 1,
            description: "test plan".into(),
            mutations,
            events: Vec::new(),
        }
    }

    // -- Shadow apply -------------------------------------------------------

    #[test]
    fn shadow_apply_move_updates_position() {
        let mut snapshot = base_snapshot();
        let mut slots = SlotMap::new();
        shadow_apply(
            &mut snapshot,
            &Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 99.0, y: 1.0 },
            },
            &mut slots,
        )
        .unwrap();
        assert_eq!(snapshot.container(1).unwrap().position.x, 99.0);
    }

    #[test]
    fn shadow_apply_resolves_planned_slots_in_order() {
        let mut snapshot = base_snapshot();
        let mut slots = SlotMap::new();
        let mutations = [
            Mutation::CreateContainer {
                slot: 1,
                title: "ghost".into(),
                body: String::new(),
                position: Position { x: 0.0, y: 0.0 },
                size: Dimensions {
                    width: 200.0,
                    height: 100.0,
                },
                state: ContainerState::Ghost,
                parent: None,
                is_auto_generated: true,
            },
            Mutation::CreatePort {
                slot: 2,
                container: EntityRef::planned(1),
            },
            Mutation::CreateNode {
                slot: 3,
                from_port: EntityRef::existing(10),
                to_port: EntityRef::planned(2),
                source_generated: true,
            },
        ];
        for m in &mutations {
            shadow_apply(&mut snapshot, m, &mut slots).unwrap();
        }
        assert_eq!(snapshot.containers.len(), 3);
        assert_eq!(snapshot.ports.len(), 3);
        assert_eq!(snapshot.nodes.len(), 1);

        let node = snapshot.nodes.values().next().unwrap();
        let port = snapshot.port(node.to_port_id).unwrap();
        let created_id = slots.resolve(EntityRef::planned(1)).unwrap();
        assert_eq!(port.container_id, created_id);
    }

    #[test]
    fn shadow_apply_unknown_container_fails() {
        let mut snapshot = base_snapshot();
        let mut slots = SlotMap::new();
        let result = shadow_apply(
            &mut snapshot,
            &Mutation::MoveContainer {
                container: EntityRef::existing(999),
                to: Position { x: 0.0, y: 0.0 },
            },
            &mut slots,
        );
        assert!(result.is_err());
    }

    #[test]
    fn delete_container_cascades_in_shadow() {
        let mut snapshot = base_snapshot();
        snapshot.nodes.insert(
            20,
            NodeEdge {
                id: 20,
                workspace_id: 1,
                from_port_id: 10,
                to_port_id: 11,
                source_generated: false,
            },
        );
        let mut slots = SlotMap::new();
        shadow_apply(
            &mut snapshot,
            &Mutation::DeleteContainer {
                container: EntityRef::existing(1),
            },
            &mut slots,
        )
        .unwrap();
        assert!(snapshot.container(1).is_none());
        assert!(snapshot.port(10).is_none());
        assert!(snapshot.nodes.is_empty(), "attached node must cascade");
        assert!(snapshot.port(11).is_some());
    }

    #[test]
    fn set_primary_reference_demotes_siblings() {
        let mut snapshot = base_snapshot();
        snapshot.references.insert(
            30,
            ContainerReference {
                id: 30,
                container_id: 1,
                entity_type: "task".into(),
                entity_id: 100,
                is_primary: true,
                parent_entity_type: None,
                parent_entity_id: None,
            },
        );
        snapshot.references.insert(
            31,
            ContainerReference {
                id: 31,
                container_id: 1,
                entity_type: "task".into(),
                entity_id: 101,
                is_primary: false,
                parent_entity_type: None,
                parent_entity_id: None,
            },
        );
        let mut slots = SlotMap::new();
        shadow_apply(
            &mut snapshot,
            &Mutation::SetPrimaryReference {
                container: EntityRef::existing(1),
                reference: EntityRef::existing(31),
            },
            &mut slots,
        )
        .unwrap();
        assert!(!snapshot.reference(30).unwrap().is_primary);
        assert!(snapshot.reference(31).unwrap().is_primary);
    }

    // -- Inverse computation ------------------------------------------------

    #[test]
    fn move_inverse_restores_prior_position() {
        let snapshot = base_snapshot();
        let p = plan(vec![Mutation::MoveContainer {
            container: EntityRef::existing(1),
            to: Position { x: 500.0, y: 600.0 },
        }]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(inverse.is_reversible);
        assert_eq!(
            inverse.mutations,
            vec![Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 10.0, y: 20.0 },
            }]
        );
    }

    #[test]
    fn sequential_moves_invert_to_original_position() {
        let snapshot = base_snapshot();
        let p = plan(vec![
            Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 100.0, y: 0.0 },
            },
            Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 200.0, y: 0.0 },
            },
        ]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(inverse.is_reversible);
        // Reversed order: undo the second move first.
        assert_eq!(
            inverse.mutations[0],
            Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 100.0, y: 0.0 },
            }
        );
        assert_eq!(
            inverse.mutations[1],
            Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 10.0, y: 20.0 },
            }
        );
    }

    #[test]
    fn activation_is_irreversible() {
        let mut snapshot = base_snapshot();
        snapshot.containers.get_mut(&1).unwrap().state = ContainerState::Ghost;
        let p = plan(vec![Mutation::ActivateContainer {
            container: EntityRef::existing(1),
            title: "now active".into(),
            body: String::new(),
        }]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(!inverse.is_reversible);
        assert!(inverse.mutations.is_empty());
        assert!(inverse.reasons[0].contains("one-way"));
    }

    #[test]
    fn container_deletion_is_irreversible() {
        let snapshot = base_snapshot();
        let p = plan(vec![Mutation::DeleteContainer {
            container: EntityRef::existing(1),
        }]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(!inverse.is_reversible);
        assert!(inverse.reasons[0].contains("cascades"));
    }

    #[test]
    fn create_chain_inverts_to_deletes_in_reverse_order() {
        let snapshot = base_snapshot();
        let p = plan(vec![
            Mutation::CreateContainer {
                slot: 1,
                title: "ghost".into(),
                body: String::new(),
                position: Position { x: 0.0, y: 0.0 },
                size: Dimensions {
                    width: 200.0,
                    height: 100.0,
                },
                state: ContainerState::Ghost,
                parent: None,
                is_auto_generated: true,
            },
            Mutation::CreatePort {
                slot: 2,
                container: EntityRef::planned(1),
            },
            Mutation::CreateNode {
                slot: 3,
                from_port: EntityRef::existing(10),
                to_port: EntityRef::planned(2),
                source_generated: true,
            },
        ]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(inverse.is_reversible);
        assert_eq!(
            inverse.mutations,
            vec![
                Mutation::DeleteNode {
                    node: EntityRef::planned(3)
                },
                Mutation::DeletePort {
                    port: EntityRef::planned(2)
                },
                Mutation::DeleteContainer {
                    container: EntityRef::planned(1)
                },
            ]
        );
    }

    #[test]
    fn delete_node_inverse_recreates_same_endpoints() {
        let mut snapshot = base_snapshot();
        snapshot.nodes.insert(
            20,
            NodeEdge {
                id: 20,
                workspace_id: 1,
                from_port_id: 10,
                to_port_id: 11,
                source_generated: true,
            },
        );
        let p = plan(vec![Mutation::DeleteNode {
            node: EntityRef::existing(20),
        }]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(inverse.is_reversible);
        match &inverse.mutations[0] {
            Mutation::CreateNode {
                from_port,
                to_port,
                source_generated,
                ..
            } => {
                assert_eq!(*from_port, EntityRef::existing(10));
                assert_eq!(*to_port, EntityRef::existing(11));
                assert!(*source_generated);
            }
            other => panic!("unexpected inverse: {other:?}"),
        }
    }

    #[test]
    fn layout_flag_inverse_restores_prior_flag() {
        let snapshot = base_snapshot();
        let p = plan(vec![Mutation::SetLayoutIntact {
            intact: false,
            reset_at: None,
        }]);
        let inverse = invert_plan(&p, &snapshot);
        assert!(inverse.is_reversible);
        assert_eq!(
            inverse.mutations,
            vec![Mutation::SetLayoutIntact {
                intact: true,
                reset_at: None,
            }]
        );
    }

    // -- Round trip ---------------------------------------------------------

    #[test]
    fn forward_then_inverse_restores_snapshot() {
        let original = base_snapshot();
        let p = plan(vec![
            Mutation::MoveContainer {
                container: EntityRef::existing(1),
                to: Position { x: 300.0, y: 400.0 },
            },
            Mutation::SetParent {
                container: EntityRef::existing(2),
                parent: Some(EntityRef::existing(1)),
            },
            Mutation::CreateNode {
                slot: 1,
                from_port: EntityRef::existing(10),
                to_port: EntityRef::existing(11),
                source_generated: false,
            },
            Mutation::SetLayoutIntact {
                intact: false,
                reset_at: None,
            },
        ]);
        let inverse = invert_plan(&p, &original);
        assert!(inverse.is_reversible);

        let mut snapshot = original.clone();
        let mut slots = SlotMap::new();
        for m in &p.mutations {
            shadow_apply(&mut snapshot, m, &mut slots).unwrap();
        }
        assert_ne!(snapshot, original);

        for m in &inverse.mutations {
            shadow_apply(&mut snapshot, m, &mut slots).unwrap();
        }
        assert_eq!(snapshot.containers, original.containers);
        assert_eq!(snapshot.workspace, original.workspace);
        // Node set (endpoints + flags) is restored; ids may differ.
        let node_set = |s: &GraphSnapshot| {
            let mut v: Vec<(DbId, DbId, bool)> = s
                .nodes
                .values()
                .map(|n| (n.from_port_id, n.to_port_id, n.source_generated))
                .collect();
            v.sort();
            v
        };
        assert_eq!(node_set(&snapshot), node_set(&original));
    }

    // -- Planned ref resolution ---------------------------------------------

    #[test]
    fn resolve_planned_refs_rewrites_bound_slots_only() {
        let mut slots = SlotMap::new();
        slots.bind(1, 77);
        let mut mutations = vec![
            Mutation::DeleteContainer {
                container: EntityRef::planned(1),
            },
            Mutation::CreatePort {
                slot: 1000,
                container: EntityRef::planned(1),
            },
            Mutation::DeleteNode {
                node: EntityRef::planned(500),
            },
        ];
        resolve_planned_refs(&mut mutations, &slots);

        assert_eq!(
            mutations[0],
            Mutation::DeleteContainer {
                container: EntityRef::existing(77),
            }
        );
        assert_eq!(
            mutations[1],
            Mutation::CreatePort {
                slot: 1000,
                container: EntityRef::existing(77),
            }
        );
        // Slot 500 was never bound; it stays planned for rollback time.
        assert_eq!(
            mutations[2],
            Mutation::DeleteNode {
                node: EntityRef::planned(500),
            }
        );
    }

    // -- Serialization ------------------------------------------------------

    #[test]
    fn mutation_serializes_with_kind_tag() {
        let m = Mutation::MoveContainer {
            container: EntityRef::existing(7),
            to: Position { x: 1.0, y: 2.0 },
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains(r#""kind":"move_container"#));
        let back: Mutation = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn plan_round_trips_through_json() {
        let p = plan(vec![Mutation::SetLayoutIntact {
            intact: true,
            reset_at: None,
        }]);
        let json = serde_json::to_string(&p).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
