//! Integration tests for the event persistence service.

use std::sync::Arc;

use sqlx::PgPool;
use taskflow_db::repositories::EventRepo;
use taskflow_events::names;
use taskflow_events::{EventBus, EventPersistence, PlatformEvent};

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_persist_writes_event_row(pool: PgPool) {
    let event = PlatformEvent::new(names::WORKFLOW_STARTED)
        .with_source(names::ENTITY_WORKFLOW_INSTANCE, 11)
        .with_payload(serde_json::json!({"template_id": 4}));

    EventPersistence::persist(&pool, &event).await.unwrap();

    let types = EventRepo::types_for_source(&pool, names::ENTITY_WORKFLOW_INSTANCE, 11)
        .await
        .unwrap();
    assert_eq!(types, vec!["workflow.started".to_string()]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_run_drains_bus_until_closed(pool: PgPool) {
    let bus = Arc::new(EventBus::default());
    let handle = tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));

    bus.publish(
        PlatformEvent::new(names::REQUEST_SUBMITTED).with_source(names::ENTITY_APPROVAL_REQUEST, 5),
    );
    bus.publish(
        PlatformEvent::new(names::REQUEST_CANCELLED).with_source(names::ENTITY_APPROVAL_REQUEST, 5),
    );
    drop(bus);
    handle.await.unwrap();

    let types = EventRepo::types_for_source(&pool, names::ENTITY_APPROVAL_REQUEST, 5)
        .await
        .unwrap();
    assert_eq!(
        types,
        vec![
            "approval_request.submitted".to_string(),
            "approval_request.cancelled".to_string()
        ]
    );
}
