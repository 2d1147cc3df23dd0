//! Core domain types and pure planning logic for the canvas engine.
//!
//! This crate holds the workspace's shared vocabulary — identifiers, graph
//! snapshots, intents, plans — together with the pure functions that turn a
//! [`intent::CanvasIntent`] into a validated [`plan::Plan`]. It has no I/O and
//! no database dependency; everything here is deterministic and testable in
//! isolation.

pub mod error;
pub mod graph;
pub mod intent;
pub mod layout;
pub mod plan;
pub mod planner;
pub mod telemetry;
pub mod types;
pub mod validation;
