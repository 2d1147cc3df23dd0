//! Structural invariant validation (PRD-22).
//!
//! Pure functions over a [`GraphSnapshot`]: given a proposed mutation and
//! the current snapshot, return the list of violated invariants (empty means
//! accepted). Expected violations are data, never panics; nothing here
//! mutates or performs I/O.
//!
//! The same checks run twice per flow: once at planning time against the
//! caller's snapshot, and again inside the execution engine against current
//! persisted state (the precondition re-check).

use serde::{Deserialize, Serialize};

use crate::graph::{ContainerState, Dimensions, GraphSnapshot};
use crate::plan::{shadow_apply, EntityRef, Mutation, Plan, SlotMap};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// A single violated invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    /// The proposed parent has the child in its own ancestor chain.
    ContainmentCycle {
        container_id: DbId,
        ancestor_id: DbId,
    },
    UnknownContainer {
        container_id: DbId,
    },
    UnknownPort {
        port_id: DbId,
    },
    UnknownNode {
        node_id: DbId,
    },
    UnknownReference {
        reference_id: DbId,
    },
    /// A plan-local slot was referenced before the mutation creating it.
    UnresolvedPlanRef {
        slot: u32,
    },
    /// An active container must carry a non-empty title or body.
    MissingContent {
        container_id: DbId,
    },
    /// Two references on one container to the same external entity.
    DuplicateReference {
        container_id: DbId,
        entity_type: String,
        entity_id: DbId,
    },
    /// The operation would leave references without exactly one primary.
    PrimaryReferenceLost {
        container_id: DbId,
    },
    /// A second primary reference on the same container.
    DuplicatePrimary {
        container_id: DbId,
    },
    /// A node connecting a container to itself.
    SelfConnection {
        container_id: DbId,
    },
    /// The same port on both ends of a node.
    SamePortTwice {
        port_id: DbId,
    },
    /// A content mutation on a ghost container (only activation is allowed).
    GhostImmutable {
        container_id: DbId,
    },
    /// Activation of a container that is already active.
    AlreadyActive {
        container_id: DbId,
    },
    /// Mirror-path content sync on a non-ghost container.
    NotAGhost {
        container_id: DbId,
    },
    /// Width and height must be strictly positive.
    NonPositiveSize {
        container_id: DbId,
    },
    /// Nesting under a container in a different workspace.
    ForeignParent {
        container_id: DbId,
        parent_id: DbId,
    },
    /// The plan's mutation sequence does not fit the snapshot it was
    /// validated against.
    SnapshotMismatch {
        detail: String,
    },
}

impl Violation {
    /// Human-readable message for error surfaces and logs.
    pub fn message(&self) -> String {
        match self {
            Violation::ContainmentCycle {
                container_id,
                ancestor_id,
            } => format!(
                "nesting container {container_id} under {ancestor_id} would create a containment cycle"
            ),
            Violation::UnknownContainer { container_id } => {
                format!("container {container_id} does not exist in this workspace")
            }
            Violation::UnknownPort { port_id } => {
                format!("port {port_id} does not exist in this workspace")
            }
            Violation::UnknownNode { node_id } => {
                format!("node {node_id} does not exist in this workspace")
            }
            Violation::UnknownReference { reference_id } => {
                format!("reference {reference_id} does not exist in this workspace")
            }
            Violation::UnresolvedPlanRef { slot } => {
                format!("plan slot #{slot} referenced before it is created")
            }
            Violation::MissingContent { container_id } => {
                format!("active container {container_id} requires a non-empty title or body")
            }
            Violation::DuplicateReference {
                container_id,
                entity_type,
                entity_id,
            } => format!(
                "container {container_id} already references {entity_type} {entity_id}"
            ),
            Violation::PrimaryReferenceLost { container_id } => format!(
                "container {container_id} would be left with references but no primary"
            ),
            Violation::DuplicatePrimary { container_id } => {
                format!("container {container_id} already has a primary reference")
            }
            Violation::SelfConnection { container_id } => {
                format!("container {container_id} cannot be connected to itself")
            }
            Violation::SamePortTwice { port_id } => {
                format!("port {port_id} cannot be both ends of a node")
            }
            Violation::GhostImmutable { container_id } => format!(
                "ghost container {container_id} is read-only; only activation is allowed"
            ),
            Violation::AlreadyActive { container_id } => {
                format!("container {container_id} is already active")
            }
            Violation::NotAGhost { container_id } => {
                format!("container {container_id} is not a ghost; mirror sync rejected")
            }
            Violation::NonPositiveSize { container_id } => {
                format!("container {container_id} requires positive width and height")
            }
            Violation::ForeignParent {
                container_id,
                parent_id,
            } => format!(
                "container {container_id} cannot be nested under {parent_id} in another workspace"
            ),
            Violation::SnapshotMismatch { detail } => {
                format!("plan does not fit the current snapshot: {detail}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rule helpers
// ---------------------------------------------------------------------------

/// Check a proposed re-parent for containment cycles.
///
/// Walks the id-indexed ancestor chain of the proposed parent and rejects if
/// the child appears in it (or is the parent itself).
pub fn check_nesting(
    snapshot: &GraphSnapshot,
    container_id: DbId,
    parent_id: DbId,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    let Some(parent) = snapshot.container(parent_id) else {
        violations.push(Violation::UnknownContainer {
            container_id: parent_id,
        });
        return violations;
    };
    let Some(child) = snapshot.container(container_id) else {
        violations.push(Violation::UnknownContainer { container_id });
        return violations;
    };

    if parent.workspace_id != child.workspace_id {
        violations.push(Violation::ForeignParent {
            container_id,
            parent_id,
        });
        return violations;
    }

    if container_id == parent_id || snapshot.is_ancestor(container_id, parent_id) {
        violations.push(Violation::ContainmentCycle {
            container_id,
            ancestor_id: parent_id,
        });
    }

    violations
}

/// Content requirement for containers that are (or become) active.
pub fn check_active_content(container_id: DbId, title: &str, body: &str) -> Vec<Violation> {
    if title.trim().is_empty() && body.trim().is_empty() {
        vec![Violation::MissingContent { container_id }]
    } else {
        Vec::new()
    }
}

fn check_size(container_id: DbId, size: Dimensions) -> Vec<Violation> {
    if size.width > 0.0 && size.height > 0.0 {
        Vec::new()
    } else {
        vec![Violation::NonPositiveSize { container_id }]
    }
}

// ---------------------------------------------------------------------------
// Per-mutation validation
// ---------------------------------------------------------------------------

/// Validate one mutation against a snapshot.
///
/// `slots` carries bindings for entities created earlier in the same plan;
/// pass a fresh [`SlotMap`] when validating a standalone mutation.
pub fn validate_mutation(
    mutation: &Mutation,
    snapshot: &GraphSnapshot,
    slots: &SlotMap,
) -> Vec<Violation> {
    match mutation {
        Mutation::CreateContainer {
            slot,
            title,
            body,
            size,
            state,
            parent,
            ..
        } => {
            let mut violations = Vec::new();
            if *state == ContainerState::Active {
                violations.extend(check_active_content(*slot as DbId, title, body));
            }
            violations.extend(check_size(*slot as DbId, *size));
            if let Some(parent_ref) = parent {
                match resolve(slots, *parent_ref) {
                    Some(parent_id) if snapshot.container(parent_id).is_none() => {
                        violations.push(Violation::UnknownContainer {
                            container_id: parent_id,
                        });
                    }
                    Some(_) => {}
                    None => violations.push(unresolved(*parent_ref)),
                }
            }
            violations
        }
        Mutation::DeleteContainer { container } => require_container(snapshot, slots, *container),
        Mutation::MoveContainer { container, .. } => {
            require_container(snapshot, slots, *container)
        }
        Mutation::ResizeContainer { container, to } => {
            let mut violations = require_container(snapshot, slots, *container);
            if violations.is_empty() {
                let id = resolve(slots, *container).unwrap_or_default();
                violations.extend(check_size(id, *to));
            }
            violations
        }
        Mutation::SetParent { container, parent } => {
            let mut violations = require_container(snapshot, slots, *container);
            if !violations.is_empty() {
                return violations;
            }
            if let Some(parent_ref) = parent {
                let child_id = resolve(slots, *container).unwrap_or_default();
                match resolve(slots, *parent_ref) {
                    Some(parent_id) => {
                        violations.extend(check_nesting(snapshot, child_id, parent_id));
                    }
                    None => violations.push(unresolved(*parent_ref)),
                }
            }
            violations
        }
        Mutation::ActivateContainer {
            container,
            title,
            body,
        } => {
            let mut violations = require_container(snapshot, slots, *container);
            if !violations.is_empty() {
                return violations;
            }
            let id = resolve(slots, *container).unwrap_or_default();
            let c = snapshot.container(id).expect("checked above");
            if c.state == ContainerState::Active {
                violations.push(Violation::AlreadyActive { container_id: id });
            }
            violations.extend(check_active_content(id, title, body));
            violations
        }
        Mutation::SyncGhostContent { container, .. } => {
            let mut violations = require_container(snapshot, slots, *container);
            if !violations.is_empty() {
                return violations;
            }
            let id = resolve(slots, *container).unwrap_or_default();
            let c = snapshot.container(id).expect("checked above");
            if c.state != ContainerState::Ghost {
                violations.push(Violation::NotAGhost { container_id: id });
            }
            violations
        }
        Mutation::CreatePort { container, .. } => require_container(snapshot, slots, *container),
        Mutation::DeletePort { port } => require_port(snapshot, slots, *port),
        Mutation::CreateNode {
            from_port, to_port, ..
        } => {
            let mut violations = Vec::new();
            violations.extend(require_port(snapshot, slots, *from_port));
            violations.extend(require_port(snapshot, slots, *to_port));
            if !violations.is_empty() {
                return violations;
            }
            let from_id = resolve(slots, *from_port).unwrap_or_default();
            let to_id = resolve(slots, *to_port).unwrap_or_default();
            if from_id == to_id {
                violations.push(Violation::SamePortTwice { port_id: from_id });
                return violations;
            }
            let from_container = snapshot.container_of_port(from_id).map(|c| c.id);
            let to_container = snapshot.container_of_port(to_id).map(|c| c.id);
            if let (Some(a), Some(b)) = (from_container, to_container) {
                if a == b {
                    violations.push(Violation::SelfConnection { container_id: a });
                }
            }
            violations
        }
        Mutation::DeleteNode { node } => require_node(snapshot, slots, *node),
        Mutation::CreateReference {
            container,
            entity_type,
            entity_id,
            is_primary,
            ..
        } => {
            let mut violations = require_container(snapshot, slots, *container);
            if !violations.is_empty() {
                return violations;
            }
            let container_id = resolve(slots, *container).unwrap_or_default();
            // Users cannot pin further entities onto a read-only mirror.
            // Plan-created ghosts (materialization) address themselves via
            // planned slots and are exempt.
            if matches!(container, EntityRef::Existing { .. }) {
                if let Some(c) = snapshot.container(container_id) {
                    if c.state == ContainerState::Ghost {
                        violations.push(Violation::GhostImmutable { container_id });
                        return violations;
                    }
                }
            }
            let existing = snapshot.references_of(container_id);
            if existing
                .iter()
                .any(|r| r.entity_type == *entity_type && r.entity_id == *entity_id)
            {
                violations.push(Violation::DuplicateReference {
                    container_id,
                    entity_type: entity_type.clone(),
                    entity_id: *entity_id,
                });
            }
            let has_primary = existing.iter().any(|r| r.is_primary);
            if *is_primary && has_primary {
                violations.push(Violation::DuplicatePrimary { container_id });
            }
            if !*is_primary && existing.is_empty() {
                violations.push(Violation::PrimaryReferenceLost { container_id });
            }
            violations
        }
        Mutation::DeleteReference { reference } => {
            let mut violations = require_reference(snapshot, slots, *reference);
            if !violations.is_empty() {
                return violations;
            }
            let id = resolve(slots, *reference).unwrap_or_default();
            let r = snapshot.reference(id).expect("checked above");
            // Removing the primary requires a handoff earlier in the plan.
            let siblings = snapshot
                .references_of(r.container_id)
                .iter()
                .filter(|other| other.id != id)
                .count();
            if r.is_primary && siblings > 0 {
                violations.push(Violation::PrimaryReferenceLost {
                    container_id: r.container_id,
                });
            }
            violations
        }
        Mutation::SetPrimaryReference {
            container,
            reference,
        } => {
            let mut violations = require_container(snapshot, slots, *container);
            violations.extend(require_reference(snapshot, slots, *reference));
            if !violations.is_empty() {
                return violations;
            }
            let container_id = resolve(slots, *container).unwrap_or_default();
            let reference_id = resolve(slots, *reference).unwrap_or_default();
            let r = snapshot.reference(reference_id).expect("checked above");
            if r.container_id != container_id {
                violations.push(Violation::UnknownReference { reference_id });
            }
            violations
        }
        Mutation::SetReferenceParent { reference, .. } => {
            require_reference(snapshot, slots, *reference)
        }
        Mutation::SetLayoutIntact { .. } => Vec::new(),
    }
}

/// Validate a whole plan by checking each mutation against an evolving
/// shadow snapshot, so later mutations see what earlier ones produced.
///
/// Stops at the first failing mutation; everything before it has already
/// been proven consistent.
pub fn validate_plan(plan: &Plan, snapshot: &GraphSnapshot) -> Result<(), Vec<Violation>> {
    let mut shadow = snapshot.clone();
    let mut slots = SlotMap::new();

    for mutation in &plan.mutations {
        let violations = validate_mutation(mutation, &shadow, &slots);
        if !violations.is_empty() {
            return Err(violations);
        }
        if let Err(detail) = shadow_apply(&mut shadow, mutation, &mut slots) {
            return Err(vec![Violation::SnapshotMismatch { detail }]);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

fn resolve(slots: &SlotMap, entity_ref: EntityRef) -> Option<DbId> {
    slots.resolve(entity_ref)
}

fn unresolved(entity_ref: EntityRef) -> Violation {
    match entity_ref {
        EntityRef::Planned { slot } => Violation::UnresolvedPlanRef { slot },
        EntityRef::Existing { id } => Violation::UnknownContainer { container_id: id },
    }
}

fn require_container(
    snapshot: &GraphSnapshot,
    slots: &SlotMap,
    entity_ref: EntityRef,
) -> Vec<Violation> {
    match resolve(slots, entity_ref) {
        Some(id) if snapshot.container(id).is_some() => Vec::new(),
        Some(id) => vec![Violation::UnknownContainer { container_id: id }],
        None => vec![unresolved(entity_ref)],
    }
}

fn require_port(snapshot: &GraphSnapshot, slots: &SlotMap, entity_ref: EntityRef) -> Vec<Violation> {
    match resolve(slots, entity_ref) {
        Some(id) if snapshot.port(id).is_some() => Vec::new(),
        Some(id) => vec![Violation::UnknownPort { port_id: id }],
        None => match entity_ref {
            EntityRef::Planned { slot } => vec![Violation::UnresolvedPlanRef { slot }],
            EntityRef::Existing { id } => vec![Violation::UnknownPort { port_id: id }],
        },
    }
}

fn require_node(snapshot: &GraphSnapshot, slots: &SlotMap, entity_ref: EntityRef) -> Vec<Violation> {
    match resolve(slots, entity_ref) {
        Some(id) if snapshot.node(id).is_some() => Vec::new(),
        Some(id) => vec![Violation::UnknownNode { node_id: id }],
        None => match entity_ref {
            EntityRef::Planned { slot } => vec![Violation::UnresolvedPlanRef { slot }],
            EntityRef::Existing { id } => vec![Violation::UnknownNode { node_id: id }],
        },
    }
}

fn require_reference(
    snapshot: &GraphSnapshot,
    slots: &SlotMap,
    entity_ref: EntityRef,
) -> Vec<Violation> {
    match resolve(slots, entity_ref) {
        Some(id) if snapshot.reference(id).is_some() => Vec::new(),
        Some(id) => vec![Violation::UnknownReference { reference_id: id }],
        None => match entity_ref {
            EntityRef::Planned { slot } => vec![Violation::UnresolvedPlanRef { slot }],
            EntityRef::Existing { id } => vec![Violation::UnknownReference { reference_id: id }],
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
