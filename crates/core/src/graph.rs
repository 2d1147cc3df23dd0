//! In-memory graph snapshot model (PRD-21).
//!
//! A [`GraphSnapshot`] is an immutable, id-indexed view of one workspace's
//! canvas: containers, ports, nodes (edges), and external references.
//! Validation, layout, and planning all operate on snapshots; only the
//! execution engine ever touches persisted state.
//!
//! Containers are addressed by opaque id plus a `parent_container_id` field.
//! Cycle checks walk the id-indexed ancestor chain, never object references.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Container state
// ---------------------------------------------------------------------------

/// Lifecycle state of a container.
///
/// Ghosts are read-only mirrors of an external entity. Activation is one-way
/// and always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Ghost,
    Active,
}

impl ContainerState {
    /// The string stored in the `containers.state` column.
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerState::Ghost => "ghost",
            ContainerState::Active => "active",
        }
    }

    /// Parse a state string from the database.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ghost" => Some(ContainerState::Ghost),
            "active" => Some(ContainerState::Active),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A position on the canvas, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A container's width and height, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Snapshot entities
// ---------------------------------------------------------------------------

/// A node on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: DbId,
    pub workspace_id: DbId,
    pub title: String,
    pub body: String,
    pub position: Position,
    pub size: Dimensions,
    pub state: ContainerState,
    pub parent_container_id: Option<DbId>,
    pub is_auto_generated: bool,
}

impl Container {
    /// Active containers must carry non-empty title or body.
    pub fn has_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.body.trim().is_empty()
    }
}

/// An attachment point owned by exactly one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: DbId,
    pub container_id: DbId,
}

/// A graph edge between two ports of two different containers.
///
/// Carries no semantic content, only structural flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEdge {
    pub id: DbId,
    pub workspace_id: DbId,
    pub from_port_id: DbId,
    pub to_port_id: DbId,
    pub source_generated: bool,
}

/// A non-authoritative pointer from a container to an external entity.
///
/// `parent_entity_*` records the hierarchy position of the mirrored entity
/// at materialization time so that layout reset can recompute placement
/// without consulting the source-of-truth system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerReference {
    pub id: DbId,
    pub container_id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub is_primary: bool,
    pub parent_entity_type: Option<String>,
    pub parent_entity_id: Option<DbId>,
}

/// Per-workspace canvas flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub id: DbId,
    pub layout_intact: bool,
    pub last_layout_reset_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// GraphSnapshot
// ---------------------------------------------------------------------------

/// An immutable, id-indexed view of one workspace's canvas graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub workspace: WorkspaceMeta,
    pub containers: BTreeMap<DbId, Container>,
    pub ports: BTreeMap<DbId, Port>,
    pub nodes: BTreeMap<DbId, NodeEdge>,
    pub references: BTreeMap<DbId, ContainerReference>,
}

impl GraphSnapshot {
    /// An empty snapshot for a workspace.
    pub fn new(workspace: WorkspaceMeta) -> Self {
        Self {
            workspace,
            containers: BTreeMap::new(),
            ports: BTreeMap::new(),
            nodes: BTreeMap::new(),
            references: BTreeMap::new(),
        }
    }

    pub fn container(&self, id: DbId) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn port(&self, id: DbId) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn node(&self, id: DbId) -> Option<&NodeEdge> {
        self.nodes.get(&id)
    }

    pub fn reference(&self, id: DbId) -> Option<&ContainerReference> {
        self.references.get(&id)
    }

    /// The container that owns a port.
    pub fn container_of_port(&self, port_id: DbId) -> Option<&Container> {
        self.port(port_id)
            .and_then(|p| self.container(p.container_id))
    }

    /// Walk the ancestor chain of a container, nearest parent first.
    ///
    /// The walk is bounded by the container count, so a corrupted parent
    /// cycle in stored data terminates instead of looping.
    pub fn ancestor_chain(&self, container_id: DbId) -> Vec<DbId> {
        let mut chain = Vec::new();
        let mut current = self
            .container(container_id)
            .and_then(|c| c.parent_container_id);
        while let Some(id) = current {
            if chain.len() > self.containers.len() {
                break;
            }
            chain.push(id);
            current = self.container(id).and_then(|c| c.parent_container_id);
        }
        chain
    }

    /// Returns `true` if `ancestor_id` appears in the ancestor chain of
    /// `container_id`.
    pub fn is_ancestor(&self, ancestor_id: DbId, container_id: DbId) -> bool {
        self.ancestor_chain(container_id).contains(&ancestor_id)
    }

    /// All ports owned by a container.
    pub fn ports_of(&self, container_id: DbId) -> Vec<&Port> {
        self.ports
            .values()
            .filter(|p| p.container_id == container_id)
            .collect()
    }

    /// All nodes anchored to any port of a container.
    pub fn nodes_touching(&self, container_id: DbId) -> Vec<&NodeEdge> {
        let port_ids: Vec<DbId> = self
            .ports_of(container_id)
            .iter()
            .map(|p| p.id)
            .collect();
        self.nodes
            .values()
            .filter(|n| port_ids.contains(&n.from_port_id) || port_ids.contains(&n.to_port_id))
            .collect()
    }

    /// All references carried by a container, ordered by id (creation order).
    pub fn references_of(&self, container_id: DbId) -> Vec<&ContainerReference> {
        self.references
            .values()
            .filter(|r| r.container_id == container_id)
            .collect()
    }

    /// The primary reference of a container, if any references exist.
    pub fn primary_reference_of(&self, container_id: DbId) -> Option<&ContainerReference> {
        self.references_of(container_id)
            .into_iter()
            .find(|r| r.is_primary)
    }

    /// All references (across containers) pointing at an external entity.
    pub fn references_to_entity(
        &self,
        entity_type: &str,
        entity_id: DbId,
    ) -> Vec<&ContainerReference> {
        self.references
            .values()
            .filter(|r| r.entity_type == entity_type && r.entity_id == entity_id)
            .collect()
    }

    /// The container mirroring an external entity through a primary
    /// reference.
    ///
    /// When two containers both claim the same entity as primary (legacy
    /// data), the earliest-created container wins. The tie-break is
    /// deterministic: lowest container id.
    pub fn container_mirroring(&self, entity_type: &str, entity_id: DbId) -> Option<&Container> {
        self.references_to_entity(entity_type, entity_id)
            .into_iter()
            .filter(|r| r.is_primary)
            .map(|r| r.container_id)
            .min()
            .and_then(|id| self.container(id))
    }

    /// Direct children of a container.
    pub fn children_of(&self, container_id: DbId) -> Vec<&Container> {
        self.containers
            .values()
            .filter(|c| c.parent_container_id == Some(container_id))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
