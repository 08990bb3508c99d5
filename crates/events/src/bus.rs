//! Publish/subscribe hub for domain events.
//!
//! Engines publish after their transaction commits, so a subscriber never
//! sees an event for a change that was rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use taskflow_core::types::DbId;
use tokio::sync::broadcast;

/// Something that happened to a template, instance or request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// One of the constants in [`crate::names`].
    pub event_type: String,
    pub source_entity_type: Option<String>,
    pub source_entity_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: Value::Object(Map::new()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the entity this event concerns.
    pub fn with_source(self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        Self {
            source_entity_type: Some(entity_type.into()),
            source_entity_id: Some(entity_id),
            ..self
        }
    }

    pub fn with_actor(self, user_id: DbId) -> Self {
        Self {
            actor_user_id: Some(user_id),
            ..self
        }
    }

    pub fn with_payload(self, payload: Value) -> Self {
        Self { payload, ..self }
    }
}

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out channel shared as `Arc<EventBus>`.
///
/// A receiver that falls more than `capacity` events behind gets
/// `RecvError::Lagged` and misses the oldest ones.
pub struct EventBus {
    tx: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Send to every live receiver and return how many there were.
    pub fn publish(&self, event: PlatformEvent) -> usize {
        let event_type = event.event_type.clone();
        self.tx.send(event).unwrap_or_else(|_| {
            tracing::debug!(%event_type, "No subscribers, event dropped");
            0
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
