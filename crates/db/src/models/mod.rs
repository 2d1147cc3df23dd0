//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for the write paths that need them
//! - Conversions into the pure snapshot types from `ideaflow-core`

pub mod container;
pub mod lock;
pub mod node;
pub mod port;
pub mod reference;
pub mod stored_plan;
pub mod telemetry;
pub mod workspace;
