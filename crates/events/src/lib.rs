//! Taskflow event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`. External notifiers subscribe here.
//! - [`PlatformEvent`]: the domain event envelope.
//! - [`EventPersistence`]: background service that writes every event to
//!   the `events` table.
//! - [`names`]: event type and source entity names emitted by the workflow
//!   engine and the approval request manager.

pub mod bus;
pub mod names;
pub mod persistence;

pub use bus::{EventBus, PlatformEvent};
pub use persistence::EventPersistence;
