use std::sync::Arc;

use taskflow_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the pool and everything else is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub pool: taskflow_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Committed workflow and approval transitions are published here.
    pub event_bus: Arc<EventBus>,
}
