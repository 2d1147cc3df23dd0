//! Behavioral events and the telemetry firewall (PRD-26).
//!
//! Execution emits rich [`BehavioralEvent`]s on the in-process bus. Before
//! anything is persisted, [`sanitize`] reduces an event to a
//! [`TelemetryRecord`]: a closed event-kind enumeration plus an allow-list
//! of metadata fields (timestamps, boolean flags, categorical tags). Content,
//! identifiers, positions, and deltas never pass the firewall. An event that
//! cannot be made compliant is rejected, not truncated.
//!
//! Downstream aggregation is descriptive only: counts and categorical
//! summaries, no scores, no comparisons.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Closed set of behavioral event kinds.
///
/// Adding a kind is a compile error everywhere it must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehavioralEventKind {
    ContainerMoved,
    ContainerResized,
    ContainerNested,
    ContainerUnnested,
    ContainerActivated,
    NodeCreated,
    NodeDeleted,
    LayoutReset,
    GhostMaterialized,
    GhostSynced,
    ReferenceBroken,
}

impl BehavioralEventKind {
    /// Dot-separated event name persisted in `telemetry_events.event_kind`.
    pub fn as_str(self) -> &'static str {
        match self {
            BehavioralEventKind::ContainerMoved => "container.moved",
            BehavioralEventKind::ContainerResized => "container.resized",
            BehavioralEventKind::ContainerNested => "container.nested",
            BehavioralEventKind::ContainerUnnested => "container.unnested",
            BehavioralEventKind::ContainerActivated => "container.activated",
            BehavioralEventKind::NodeCreated => "node.created",
            BehavioralEventKind::NodeDeleted => "node.deleted",
            BehavioralEventKind::LayoutReset => "layout.reset",
            BehavioralEventKind::GhostMaterialized => "ghost.materialized",
            BehavioralEventKind::GhostSynced => "ghost.synced",
            BehavioralEventKind::ReferenceBroken => "reference.broken",
        }
    }

    /// All recognised kinds.
    pub const ALL: &'static [BehavioralEventKind] = &[
        BehavioralEventKind::ContainerMoved,
        BehavioralEventKind::ContainerResized,
        BehavioralEventKind::ContainerNested,
        BehavioralEventKind::ContainerUnnested,
        BehavioralEventKind::ContainerActivated,
        BehavioralEventKind::NodeCreated,
        BehavioralEventKind::NodeDeleted,
        BehavioralEventKind::LayoutReset,
        BehavioralEventKind::GhostMaterialized,
        BehavioralEventKind::GhostSynced,
        BehavioralEventKind::ReferenceBroken,
    ];
}

// ---------------------------------------------------------------------------
// Behavioral events (pre-firewall)
// ---------------------------------------------------------------------------

/// A rich event describing a committed canvas change.
///
/// Lives on the in-process bus only; it may carry identifiers and detail
/// that must never reach the telemetry store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralEvent {
    pub kind: BehavioralEventKind,
    pub workspace_id: DbId,
    pub actor_id: DbId,
    pub occurred_at: Timestamp,
    /// Free-form JSON detail. Only allow-listed fields survive the firewall.
    pub payload: Value,
}

impl BehavioralEvent {
    pub fn new(
        kind: BehavioralEventKind,
        workspace_id: DbId,
        actor_id: DbId,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            kind,
            workspace_id,
            actor_id,
            occurred_at,
            payload: Value::Object(Map::new()),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// Allow-list
// ---------------------------------------------------------------------------

/// Expected JSON type for an allow-listed metadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Boolean,
    /// A short categorical string tag; never free text.
    Tag,
}

/// Metadata fields that may appear in a persisted telemetry record.
///
/// Everything else — content, identifiers, positions, deltas — is stripped.
const ALLOWED_FIELDS: &[(&str, FieldType)] = &[
    ("auto_generated", FieldType::Boolean),
    ("source_generated", FieldType::Boolean),
    ("layout_intact", FieldType::Boolean),
    ("broke_layout", FieldType::Boolean),
    ("reversible", FieldType::Boolean),
    ("entity_type", FieldType::Tag),
    ("trigger", FieldType::Tag),
];

/// Longest tag value accepted by the firewall. Anything longer is treated
/// as free text, which the allow-list forbids.
const MAX_TAG_LEN: usize = 64;

fn allowed_type(key: &str) -> Option<FieldType> {
    ALLOWED_FIELDS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, t)| *t)
}

// ---------------------------------------------------------------------------
// Sanitized records
// ---------------------------------------------------------------------------

/// A firewall-approved, append-only telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub event_kind: String,
    pub workspace_id: DbId,
    pub occurred_at: Timestamp,
    /// Allow-listed attributes only.
    pub attributes: Value,
}

/// Why an event could not be made compliant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirewallRejection {
    #[error("event payload is not a JSON object")]
    NonObjectPayload,
    #[error("allow-listed field '{key}' has a disallowed value type")]
    DisallowedValueType { key: String },
    #[error("tag field '{key}' exceeds {MAX_TAG_LEN} characters")]
    TagTooLong { key: String },
}

/// Reduce a behavioral event to a persistable telemetry record.
///
/// Fields not on the allow-list are stripped. The stripped result is then
/// validated: an allow-listed key carrying the wrong value type rejects the
/// whole event. Actor identity never passes through.
pub fn sanitize(event: &BehavioralEvent) -> Result<TelemetryRecord, FirewallRejection> {
    let empty = Map::new();
    let payload = match &event.payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(FirewallRejection::NonObjectPayload),
    };

    let mut attributes = Map::new();
    for (key, value) in payload {
        let Some(field_type) = allowed_type(key) else {
            continue; // stripped
        };
        match (field_type, value) {
            (FieldType::Boolean, Value::Bool(_)) => {
                attributes.insert(key.clone(), value.clone());
            }
            (FieldType::Tag, Value::String(s)) => {
                if s.len() > MAX_TAG_LEN {
                    return Err(FirewallRejection::TagTooLong { key: key.clone() });
                }
                attributes.insert(key.clone(), value.clone());
            }
            _ => {
                return Err(FirewallRejection::DisallowedValueType { key: key.clone() });
            }
        }
    }

    Ok(TelemetryRecord {
        event_kind: event.kind.as_str().to_string(),
        workspace_id: event.workspace_id,
        occurred_at: event.occurred_at,
        attributes: Value::Object(attributes),
    })
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Descriptive counts over a set of telemetry records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    pub total: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub by_entity_type: BTreeMap<String, u64>,
}

/// Count records per kind and per `entity_type` tag.
///
/// Produces counts and categorical summaries only.
pub fn summarize(records: &[TelemetryRecord]) -> TelemetrySummary {
    let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_entity_type: BTreeMap<String, u64> = BTreeMap::new();

    for record in records {
        *by_kind.entry(record.event_kind.clone()).or_insert(0) += 1;
        if let Some(Value::String(tag)) = record.attributes.get("entity_type") {
            *by_entity_type.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    TelemetrySummary {
        total: records.len() as u64,
        by_kind,
        by_entity_type,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn event(payload: Value) -> BehavioralEvent {
        BehavioralEvent::new(
            BehavioralEventKind::ContainerMoved,
            1,
            42,
            chrono::Utc::now(),
        )
        .with_payload(payload)
    }

    // -- Kind strings -------------------------------------------------------

    #[test]
    fn kind_strings_are_unique_and_dotted() {
        let mut seen = std::collections::BTreeSet::new();
        for kind in BehavioralEventKind::ALL {
            let s = kind.as_str();
            assert!(s.contains('.'), "{s} should be dot-separated");
            assert!(seen.insert(s), "{s} duplicated");
        }
    }

    // -- Stripping ----------------------------------------------------------

    #[test]
    fn disallowed_fields_are_stripped() {
        let record = sanitize(&event(json!({
            "auto_generated": true,
            "container_id": 7,
            "title": "my secret idea",
            "x": 120.5,
            "delta_x": -3.0,
        })))
        .unwrap();

        assert_eq!(record.attributes, json!({ "auto_generated": true }));
    }

    #[test]
    fn actor_identity_never_passes() {
        let record = sanitize(&event(json!({ "layout_intact": false }))).unwrap();
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("actor"));
        assert!(!serialized.contains("42"));
    }

    #[test]
    fn empty_payload_is_compliant() {
        let record = sanitize(&event(json!({}))).unwrap();
        assert_eq!(record.attributes, json!({}));
        assert_eq!(record.event_kind, "container.moved");
    }

    #[test]
    fn null_payload_is_treated_as_empty() {
        let record = sanitize(&event(Value::Null)).unwrap();
        assert_eq!(record.attributes, json!({}));
    }

    // -- Rejection ----------------------------------------------------------

    #[test]
    fn non_object_payload_rejected() {
        assert_matches!(
            sanitize(&event(json!(["list", "payload"]))),
            Err(FirewallRejection::NonObjectPayload)
        );
        assert_matches!(
            sanitize(&event(json!("text"))),
            Err(FirewallRejection::NonObjectPayload)
        );
    }

    #[test]
    fn wrong_type_on_allowed_field_rejects_event() {
        // A numeric value smuggled into a boolean field must reject the
        // event outright, not be coerced or dropped.
        assert_matches!(
            sanitize(&event(json!({ "auto_generated": 1 }))),
            Err(FirewallRejection::DisallowedValueType { .. })
        );
        assert_matches!(
            sanitize(&event(json!({ "entity_type": 99 }))),
            Err(FirewallRejection::DisallowedValueType { .. })
        );
    }

    #[test]
    fn overlong_tag_rejected_as_free_text() {
        let long = "x".repeat(MAX_TAG_LEN + 1);
        assert_matches!(
            sanitize(&event(json!({ "entity_type": long }))),
            Err(FirewallRejection::TagTooLong { .. })
        );
    }

    #[test]
    fn tag_at_limit_accepted() {
        let tag = "x".repeat(MAX_TAG_LEN);
        let record = sanitize(&event(json!({ "entity_type": tag }))).unwrap();
        assert!(record.attributes.get("entity_type").is_some());
    }

    // -- Aggregation --------------------------------------------------------

    #[test]
    fn summary_counts_by_kind_and_tag() {
        let records = vec![
            sanitize(&event(json!({ "entity_type": "task" }))).unwrap(),
            sanitize(&event(json!({ "entity_type": "task" }))).unwrap(),
            sanitize(
                &BehavioralEvent::new(
                    BehavioralEventKind::NodeCreated,
                    1,
                    42,
                    chrono::Utc::now(),
                )
                .with_payload(json!({ "entity_type": "milestone" })),
            )
            .unwrap(),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_kind["container.moved"], 2);
        assert_eq!(summary.by_kind["node.created"], 1);
        assert_eq!(summary.by_entity_type["task"], 2);
        assert_eq!(summary.by_entity_type["milestone"], 1);
    }

    #[test]
    fn summary_of_empty_set_is_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.by_kind.is_empty());
    }

    // -- Serialization ------------------------------------------------------

    #[test]
    fn behavioral_event_round_trips_through_json() {
        let e = event(json!({ "auto_generated": true }));
        let json = serde_json::to_string(&e).unwrap();
        let back: BehavioralEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, BehavioralEventKind::ContainerMoved);
        assert_eq!(back.workspace_id, 1);
    }
}
