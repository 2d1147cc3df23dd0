//! Closed intent and source-event sets (PRD-24).
//!
//! Serialized as JSON with an internally-tagged `"type"` discriminator so
//! the frontend and the source-of-truth integration can route by type
//! string. Both enums are matched exhaustively in the planner; adding a
//! variant is a compile error everywhere it must be handled.

use serde::{Deserialize, Serialize};

use crate::graph::{Dimensions, Position};
use crate::layout::SourceRef;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// User intents
// ---------------------------------------------------------------------------

/// A user gesture on the canvas, already reduced to its semantic intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CanvasIntent {
    /// User drags a container to a new position.
    #[serde(rename = "container.move")]
    MoveContainer { container_id: DbId, to: Position },

    /// User resizes a container.
    #[serde(rename = "container.resize")]
    ResizeContainer { container_id: DbId, to: Dimensions },

    /// User nests a container under a parent.
    #[serde(rename = "container.nest")]
    NestContainer { container_id: DbId, parent_id: DbId },

    /// User pulls a container out of its parent.
    #[serde(rename = "container.unnest")]
    UnnestContainer { container_id: DbId },

    /// User promotes a ghost to an editable container, supplying its
    /// initial content.
    #[serde(rename = "container.activate")]
    ActivateContainer {
        container_id: DbId,
        title: String,
        body: String,
    },

    /// User draws a manual edge between two ports.
    #[serde(rename = "node.create")]
    CreateNode { from_port_id: DbId, to_port_id: DbId },

    /// User deletes an edge.
    #[serde(rename = "node.delete")]
    DeleteNode { node_id: DbId },

    /// User restores the default hierarchical layout.
    #[serde(rename = "layout.reset")]
    ResetLayout,
}

impl CanvasIntent {
    /// Short lowercase tag used in descriptions and tracing.
    pub fn kind_str(&self) -> &'static str {
        match self {
            CanvasIntent::MoveContainer { .. } => "container.move",
            CanvasIntent::ResizeContainer { .. } => "container.resize",
            CanvasIntent::NestContainer { .. } => "container.nest",
            CanvasIntent::UnnestContainer { .. } => "container.unnest",
            CanvasIntent::ActivateContainer { .. } => "container.activate",
            CanvasIntent::CreateNode { .. } => "node.create",
            CanvasIntent::DeleteNode { .. } => "node.delete",
            CanvasIntent::ResetLayout => "layout.reset",
        }
    }
}

// ---------------------------------------------------------------------------
// Source-of-truth lifecycle events
// ---------------------------------------------------------------------------

/// A lifecycle event consumed from the source-of-truth system.
///
/// The engine mirrors these onto the canvas and never writes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceEvent {
    #[serde(rename = "entity.created")]
    EntityCreated {
        entity: SourceRef,
        title: String,
        parent: Option<SourceRef>,
    },

    #[serde(rename = "entity.updated")]
    EntityUpdated {
        entity: SourceRef,
        title: String,
        parent: Option<SourceRef>,
    },

    #[serde(rename = "entity.deleted")]
    EntityDeleted { entity: SourceRef },
}

impl SourceEvent {
    pub fn kind_str(&self) -> &'static str {
        match self {
            SourceEvent::EntityCreated { .. } => "entity.created",
            SourceEvent::EntityUpdated { .. } => "entity.updated",
            SourceEvent::EntityDeleted { .. } => "entity.deleted",
        }
    }

    /// The entity this event is about.
    pub fn entity(&self) -> &SourceRef {
        match self {
            SourceEvent::EntityCreated { entity, .. }
            | SourceEvent::EntityUpdated { entity, .. }
            | SourceEvent::EntityDeleted { entity } => entity,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_serializes_with_dotted_type_tag() {
        let intent = CanvasIntent::MoveContainer {
            container_id: 7,
            to: Position { x: 10.0, y: 20.0 },
        };
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains(r#""type":"container.move"#));

        let back: CanvasIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(intent, back);
    }

    #[test]
    fn unknown_intent_type_rejected() {
        let result: Result<CanvasIntent, _> =
            serde_json::from_str(r#"{"type":"container.explode","container_id":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn reset_layout_round_trips() {
        let intent = CanvasIntent::ResetLayout;
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains(r#""type":"layout.reset"#));
        let back: CanvasIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(intent, back);
    }

    #[test]
    fn source_event_round_trips() {
        let event = SourceEvent::EntityCreated {
            entity: SourceRef::new("task", 100),
            title: "new task".into(),
            parent: Some(SourceRef::new("project", 1)),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"entity.created"#));
        let back: SourceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn event_entity_accessor_covers_all_variants() {
        let entity = SourceRef::new("task", 5);
        let events = [
            SourceEvent::EntityCreated {
                entity: entity.clone(),
                title: String::new(),
                parent: None,
            },
            SourceEvent::EntityUpdated {
                entity: entity.clone(),
                title: String::new(),
                parent: None,
            },
            SourceEvent::EntityDeleted {
                entity: entity.clone(),
            },
        ];
        for event in &events {
            assert_eq!(event.entity(), &entity);
        }
    }

    #[test]
    fn kind_strings_match_serde_tags() {
        let intent = CanvasIntent::ResetLayout;
        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains(intent.kind_str()));
    }
}
