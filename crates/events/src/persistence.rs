//! Writes every bus event to the `events` table.

use taskflow_core::types::DbId;
use taskflow_db::repositories::EventRepo;
use taskflow_db::DbPool;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::bus::PlatformEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Drain `events` into the database until every sender is gone.
    ///
    /// A failed insert or a lagged receiver is logged and skipped.
    pub async fn run(pool: DbPool, mut events: Receiver<PlatformEvent>) {
        let mut written: u64 = 0;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event log fell behind the bus");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match Self::persist(&pool, &event).await {
                Ok(_) => written += 1,
                Err(e) => tracing::error!(
                    error = %e,
                    event_type = %event.event_type,
                    "Could not record event"
                ),
            }
        }
        tracing::info!(written, "Event log stopped");
    }

    pub async fn persist(pool: &DbPool, event: &PlatformEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &event.event_type,
            event.source_entity_type.as_deref(),
            event.source_entity_id,
            event.actor_user_id,
            &event.payload,
        )
        .await
    }
}
