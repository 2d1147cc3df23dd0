//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` for reads and standalone writes, or `&mut PgConnection`
//! for the mutation paths the execution engine drives inside one
//! transaction.

pub mod container_repo;
pub mod graph_repo;
pub mod lock_repo;
pub mod node_repo;
pub mod port_repo;
pub mod reference_repo;
pub mod stored_plan_repo;
pub mod telemetry_repo;
pub mod workspace_repo;

pub use container_repo::ContainerRepo;
pub use graph_repo::GraphRepo;
pub use lock_repo::CanvasLockRepo;
pub use node_repo::NodeRepo;
pub use port_repo::PortRepo;
pub use reference_repo::ReferenceRepo;
pub use stored_plan_repo::StoredPlanRepo;
pub use telemetry_repo::TelemetryRepo;
pub use workspace_repo::WorkspaceRepo;
