// tests/store_scenarios.rs
// End-to-end scenarios against a real (in-memory) Store: S1/S2/S5/S6 from
// the crate's testable-properties list, plus the migration-monotonicity
// invariant.

use sqlx::sqlite::SqlitePoolOptions;
use tg_monitor::store::{NewMessage, Store};

#[tokio::test]
async fn connect_creates_file_backed_database_and_reopens_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("monitor.db");

    let store = Store::connect(&db_path).await.unwrap();
    store.groups().upsert_group(1, "Room", None, None).await.unwrap();
    store.close().await;

    assert!(db_path.exists(), "connect must create the database file on disk");

    // Reopening the same file must not re-run schema/migrations destructively.
    let reopened = Store::connect(&db_path).await.unwrap();
    let groups = reopened.groups().get_groups().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].title, "Room");
}

async fn memory_store() -> Store {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    Store::from_memory_pool(pool).await.unwrap()
}

fn new_message(id: i64, group_id: i64, sender_name: &str, text: &str) -> NewMessage {
    NewMessage {
        id,
        group_id,
        sender_id: None,
        sender_name: Some(sender_name.to_string()),
        text: Some(text.to_string()),
        date: "2024-01-01T00:00:00Z".to_string(),
        media_type: None,
        forward_from: None,
        reply_to_id: None,
    }
}

#[tokio::test]
async fn s1_insert_and_search() {
    let store = memory_store().await;
    store.groups().upsert_group(-100500, "Promo Room", None, None).await.unwrap();
    let msg = new_message(100, -100500, "alice", "check https://example.com/x promo");
    store.messages().insert_message(&msg).await.unwrap();

    let found = store.messages().search_messages("promo", 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 100);

    let links = store.links().get_links_aggregated(10, &["t.me".to_string()]).await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].url, "https://example.com/x");
    assert_eq!(links[0].total_count, 1);
    assert_eq!(links[0].group_count, 1);
}

#[tokio::test]
async fn s2_edit_then_delete() {
    let store = memory_store().await;
    store.groups().upsert_group(1, "Room", None, None).await.unwrap();
    let msg = new_message(200, 1, "bob", "hello");
    store.messages().insert_message(&msg).await.unwrap();

    let changed = store.messages().update_message_text(200, 1, Some("hello world"), None).await.unwrap();
    assert!(changed);

    assert_eq!(store.messages().search_messages("world", 10).await.unwrap().len(), 1);
    // "hello" is still a substring of the edited text, so it still matches
    // the same (updated) row, not a duplicate.
    assert_eq!(store.messages().search_messages("hello", 10).await.unwrap().len(), 1);

    let deleted = store.messages().delete_messages(&[200], 1).await.unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(store.messages().search_messages("world", 10).await.unwrap().len(), 0);
    assert_eq!(store.messages().search_messages("hello", 10).await.unwrap().len(), 0);
}

#[tokio::test]
async fn s5_reconnect_gap_recovery_no_duplicates() {
    let store = memory_store().await;
    store.groups().upsert_group(1, "Room", None, None).await.unwrap();

    let first = new_message(1, 1, "alice", "before the gap");
    store.messages().insert_message(&first).await.unwrap();

    // Simulate a gap-recovery batch that re-observes the same message
    // (the platform can redeliver history overlapping what's already
    // stored) alongside genuinely new ones.
    let batch = vec![
        new_message(1, 1, "alice", "before the gap"),
        new_message(2, 1, "alice", "during the gap"),
        new_message(3, 1, "alice", "still during the gap"),
    ];
    store.messages().insert_messages_batch(&batch).await.unwrap();

    let all = store.messages().get_messages(Some(1), None, None, None).await.unwrap();
    assert_eq!(all.len(), 3);
    let count = store.messages().get_message_count(Some(1), None, None).await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn s6_anonymous_channel_aggregation() {
    let store = memory_store().await;
    store.groups().upsert_group(42, "Channel X", None, None).await.unwrap();

    for id in 1..=3 {
        let msg = NewMessage {
            id,
            group_id: 42,
            sender_id: None,
            sender_name: Some("Channel X".to_string()),
            text: Some(format!("post {id}")),
            date: "2024-01-01T00:00:00Z".to_string(),
            media_type: None,
            forward_from: None,
            reply_to_id: None,
        };
        store.messages().insert_message(&msg).await.unwrap();
    }

    let stats = store.analytics().get_stats(None, None).await.unwrap();
    let row = stats.iter().find(|s| s.group_id == 42).expect("group 42 present");
    assert_eq!(row.message_count, 3);
    assert!(row.active_users >= 1, "anonymous posts must aggregate into at least one synthetic sender");
}

#[tokio::test]
async fn idempotent_ingest_same_id_and_group() {
    let store = memory_store().await;
    store.groups().upsert_group(1, "Room", None, None).await.unwrap();
    let msg = new_message(1, 1, "alice", "hi");
    for _ in 0..5 {
        store.messages().insert_message(&msg).await.unwrap();
    }
    let count = store.messages().get_message_count(Some(1), None, None).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn migrations_are_idempotent_on_reconnect() {
    let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
    let store = Store::from_memory_pool(pool.clone()).await.unwrap();
    drop(store);
    // Re-running bootstrap + migrations against the same (already-migrated)
    // pool must be a no-op, never an error or a duplicate ledger row.
    let store2 = Store::from_memory_pool(pool).await.unwrap();
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_version")
        .fetch_one(store2.pool())
        .await
        .unwrap();
    assert_eq!(row.0, 6);
}
