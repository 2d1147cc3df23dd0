//! In-process event infrastructure for the canvas engine.

pub mod bus;

pub use bus::EventBus;
