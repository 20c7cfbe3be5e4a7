// tests/ingestion_scenarios.rs
// Drives the Ingestion Worker state machine against `MockSession` — no
// network stack, matching the trait-boundary design in src/platform/mod.rs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex as AsyncMutex;

use tg_monitor::config::GroupTarget;
use tg_monitor::ingestion::{Worker, WorkerConfig};
use tg_monitor::platform::mock::MockSession;
use tg_monitor::platform::{PlatformEvent, RawMessage, ResolvedGroup, Sender};
use tg_monitor::store::{NewMessage, Store};

async fn memory_store() -> Store {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    Store::from_memory_pool(pool).await.unwrap()
}

fn room() -> ResolvedGroup {
    ResolvedGroup { id: 100, title: "Room".to_string(), username: None, member_count: None }
}

#[tokio::test]
async fn worker_ingests_live_message_and_drops_service_messages() {
    let store = memory_store().await;
    let session = MockSession::new().with_group("100", room());

    session.push_event(PlatformEvent::NewMessage(RawMessage {
        id: 1,
        group_id: 100,
        sender_id: Some(7),
        sender: Some(Sender::User { first_name: Some("Alice".to_string()), last_name: None, username: None, id: 7 }),
        text: Some("hi there".to_string()),
        date: Utc::now(),
        media: None,
        forward_from: None,
        reply_to_id: None,
        is_service_message: false,
    }));
    session.push_event(PlatformEvent::NewMessage(RawMessage {
        id: 2,
        group_id: 100,
        sender_id: Some(7),
        sender: None,
        text: None,
        date: Utc::now(),
        media: None,
        forward_from: None,
        reply_to_id: None,
        is_service_message: true,
    }));

    let config = WorkerConfig { tenant_id: 1, groups: vec![GroupTarget { id: Some(100), username: None }], retention_days: 90 };
    let worker = Worker::new(Box::new(session), store.clone(), None, config, Arc::new(AsyncMutex::new(())));

    let handle = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let messages = store.messages().get_messages(Some(100), None, None, None).await.unwrap();
    assert_eq!(messages.len(), 1, "the service message must have been dropped by decode");
    assert_eq!(messages[0].sender_name.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn worker_recovers_gap_on_startup() {
    let store = memory_store().await;
    store.groups().upsert_group(100, "Room", None, None).await.unwrap();
    store
        .messages()
        .insert_message(&NewMessage {
            id: 1,
            group_id: 100,
            sender_id: Some(1),
            sender_name: Some("alice".to_string()),
            text: Some("before the outage".to_string()),
            date: "2024-01-01T00:00:00Z".to_string(),
            media_type: None,
            forward_from: None,
            reply_to_id: None,
        })
        .await
        .unwrap();

    let session = MockSession::new().with_group("100", room()).with_history(
        100,
        vec![RawMessage {
            id: 2,
            group_id: 100,
            sender_id: Some(1),
            sender: Some(Sender::User { first_name: Some("Alice".to_string()), last_name: None, username: None, id: 1 }),
            text: Some("recovered after the outage".to_string()),
            date: Utc::now(),
            media: None,
            forward_from: None,
            reply_to_id: None,
            is_service_message: false,
        }],
    );

    let config = WorkerConfig { tenant_id: 1, groups: vec![GroupTarget { id: Some(100), username: None }], retention_days: 90 };
    let worker = Worker::new(Box::new(session), store.clone(), None, config, Arc::new(AsyncMutex::new(())));

    let handle = tokio::spawn(worker.run());
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    let messages = store.messages().get_messages(Some(100), None, None, None).await.unwrap();
    assert_eq!(messages.len(), 2, "gap recovery must have inserted the backfilled message alongside the pre-existing one");
}
