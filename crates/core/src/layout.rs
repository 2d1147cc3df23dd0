//! Default layout and ghost materialization placement (PRD-23).
//!
//! Computes hierarchical placement for containers mirrored from the
//! source-of-truth system. Placement is a pure function of the entity
//! hierarchy: no wall-clock time, no randomness, so re-running layout on
//! unchanged input yields bit-identical positions.
//!
//! Per workspace, `layout_intact` starts true. Any user-initiated move,
//! resize, manual nesting, explicit activation, or deletion of an
//! auto-generated node flips it to false permanently; from then on new
//! mirrored entities spawn at a fixed origin offset, unnested, with no
//! auto-generated nodes. Only the explicit reset operation restores the
//! default layout.

use serde::{Deserialize, Serialize};

use crate::graph::{ContainerState, Dimensions, GraphSnapshot, Position};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Canvas defaults
// ---------------------------------------------------------------------------

/// Default container width in canvas units.
pub const DEFAULT_CONTAINER_WIDTH: f64 = 200.0;

/// Default container height in canvas units.
pub const DEFAULT_CONTAINER_HEIGHT: f64 = 100.0;

/// Horizontal offset between a parent and its children (one depth level).
pub const CHILD_INDENT_X: f64 = 260.0;

/// Vertical spacing between layout rows.
pub const ROW_SPACING_Y: f64 = 140.0;

/// Fixed spawn offset for new ghosts once the default layout is broken.
pub const ORIGIN_SPAWN: Position = Position { x: 40.0, y: 40.0 };

/// Default size for materialized ghost containers.
pub fn default_size() -> Dimensions {
    Dimensions {
        width: DEFAULT_CONTAINER_WIDTH,
        height: DEFAULT_CONTAINER_HEIGHT,
    }
}

// ---------------------------------------------------------------------------
// Source hierarchy input
// ---------------------------------------------------------------------------

/// Identity of an entity in the source-of-truth system.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub entity_type: String,
    pub entity_id: DbId,
}

impl SourceRef {
    pub fn new(entity_type: impl Into<String>, entity_id: DbId) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }
}

/// One mirrored entity plus its hierarchy position, as reported by the
/// source-of-truth system or reconstructed from stored references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntity {
    pub entity: SourceRef,
    pub title: String,
    pub parent: Option<SourceRef>,
}

/// A computed placement for one mirrored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEntity {
    pub entity: SourceRef,
    pub title: String,
    pub parent: Option<SourceRef>,
    pub position: Position,
    pub depth: u32,
}

// ---------------------------------------------------------------------------
// Default layout computation
// ---------------------------------------------------------------------------

/// Compute default hierarchical placement for a set of mirrored entities.
///
/// Depth indents along the x axis; rows advance down the y axis in
/// depth-first order. Roots and siblings are visited in `(entity_type,
/// entity_id)` order, so the output is fully determined by the input set.
/// Entities whose parent is not part of the input are treated as roots.
pub fn compute_default_layout(entities: &[SourceEntity]) -> Vec<PlacedEntity> {
    let known: std::collections::BTreeSet<&SourceRef> =
        entities.iter().map(|e| &e.entity).collect();

    let mut roots: Vec<&SourceEntity> = entities
        .iter()
        .filter(|e| match &e.parent {
            Some(parent) => !known.contains(parent),
            None => true,
        })
        .collect();
    roots.sort_by(|a, b| a.entity.cmp(&b.entity));

    let mut placed = Vec::with_capacity(entities.len());
    let mut row: u32 = 0;
    for root in roots {
        place_subtree(root, entities, 0, &mut row, &mut placed);
    }
    placed
}

fn place_subtree(
    entity: &SourceEntity,
    all: &[SourceEntity],
    depth: u32,
    row: &mut u32,
    out: &mut Vec<PlacedEntity>,
) {
    out.push(PlacedEntity {
        entity: entity.entity.clone(),
        title: entity.title.clone(),
        parent: entity.parent.clone(),
        position: Position {
            x: f64::from(depth) * CHILD_INDENT_X,
            y: f64::from(*row) * ROW_SPACING_Y,
        },
        depth,
    });
    *row += 1;

    let mut children: Vec<&SourceEntity> = all
        .iter()
        .filter(|e| e.parent.as_ref() == Some(&entity.entity))
        .collect();
    children.sort_by(|a, b| a.entity.cmp(&b.entity));
    for child in children {
        place_subtree(child, all, depth + 1, row, out);
    }
}

// ---------------------------------------------------------------------------
// Incremental placement
// ---------------------------------------------------------------------------

/// Position for a newly mirrored entity while the default layout is intact.
///
/// Children are indented from their parent's container and stacked below
/// its existing children; parentless entities are appended below the
/// current root row. Depends only on the snapshot contents.
pub fn next_hierarchical_position(
    snapshot: &GraphSnapshot,
    parent_container_id: Option<DbId>,
) -> Position {
    match parent_container_id.and_then(|id| snapshot.container(id)) {
        Some(parent) => {
            let siblings = snapshot.children_of(parent.id).len() as u32;
            Position {
                x: parent.position.x + CHILD_INDENT_X,
                y: parent.position.y + f64::from(siblings + 1) * ROW_SPACING_Y,
            }
        }
        None => {
            let roots = snapshot
                .containers
                .values()
                .filter(|c| c.parent_container_id.is_none())
                .count() as u32;
            Position {
                x: 0.0,
                y: f64::from(roots) * ROW_SPACING_Y,
            }
        }
    }
}

/// Spawn position for new ghosts once the default layout is broken.
///
/// The system never fights a user who has taken manual control: a fixed
/// origin offset, no nesting, no auto-generated nodes.
pub fn origin_spawn_position() -> Position {
    ORIGIN_SPAWN
}

// ---------------------------------------------------------------------------
// Hierarchy reconstruction for layout reset
// ---------------------------------------------------------------------------

/// Rebuild the mirrored entity hierarchy from stored primary references.
///
/// Covers ghost and auto-generated containers (the ones the default layout
/// owns); manually created containers are never repositioned by a reset.
pub fn mirrored_hierarchy(snapshot: &GraphSnapshot) -> Vec<SourceEntity> {
    let mut entities: Vec<SourceEntity> = Vec::new();
    for container in snapshot.containers.values() {
        if container.state != ContainerState::Ghost && !container.is_auto_generated {
            continue;
        }
        let Some(reference) = snapshot.primary_reference_of(container.id) else {
            continue;
        };
        let parent = match (&reference.parent_entity_type, reference.parent_entity_id) {
            (Some(t), Some(id)) => Some(SourceRef::new(t.clone(), id)),
            _ => None,
        };
        entities.push(SourceEntity {
            entity: SourceRef::new(reference.entity_type.clone(), reference.entity_id),
            title: container.title.clone(),
            parent,
        });
    }
    entities.sort_by(|a, b| a.entity.cmp(&b.entity));
    entities
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
