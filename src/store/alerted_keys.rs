// src/store/alerted_keys.rs
// Persistence for the alert engine's dedup keys ("{group_id}_{message_id}"),
// so a restart doesn't re-notify for messages already alerted on.

use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::error::StoreError;

pub struct AlertedKeyOperations {
    pool: SqlitePool,
}

impl AlertedKeyOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_alerted_message(&self, msg_key: &str) -> Result<(), StoreError> {
        // Bind `alerted_at` explicitly in the same RFC3339 form the
        // rehydrate/cleanup queries compare against — the column's own
        // `DEFAULT (datetime('now'))` renders space-separated
        // (`"2026-07-28 20:00:00"`), which lexicographically compares
        // incorrectly against an RFC3339 cutoff (`"2026-07-28T05:00:00Z"`)
        // on the same calendar date.
        let alerted_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let result = sqlx::query("INSERT OR IGNORE INTO alerted_messages (msg_key, alerted_at) VALUES (?, ?)")
            .bind(msg_key)
            .bind(alerted_at)
            .execute(&self.pool)
            .await;
        if let Err(err) = result {
            warn!("failed to persist alert dedup key: {err}");
        }
        Ok(())
    }

    /// Returns keys alerted within `hours`, oldest first, so the caller can
    /// rehydrate its in-memory FIFO in the same order they were originally
    /// emitted.
    pub async fn get_recent_alerted_ids(&self, hours: i64) -> Result<Vec<String>, StoreError> {
        let since = (chrono::Utc::now() - chrono::Duration::hours(hours))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let rows = sqlx::query("SELECT msg_key FROM alerted_messages WHERE alerted_at >= ? ORDER BY alerted_at ASC")
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(|r| r.get("msg_key")).collect())
    }

    pub async fn cleanup_old_alerts(&self, keep_hours: i64) -> Result<(), StoreError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::hours(keep_hours))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        sqlx::query("DELETE FROM alerted_messages WHERE alerted_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    async fn memory_store() -> Store {
        let pool = sqlx::sqlite::SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        Store::from_memory_pool(pool).await.unwrap()
    }

    /// Regression test for the storage/comparand format mismatch: a key
    /// alerted earlier today (same calendar date as "now", well inside the
    /// 24h rehydrate window) must still come back from
    /// `get_recent_alerted_ids`. Before binding `alerted_at` explicitly,
    /// the column's `datetime('now')` default rendered space-separated
    /// (`"... 20:00:00"`), which lexicographically compares as *less than*
    /// an RFC3339 cutoff on the same date (`"...T05:00:00Z"`) purely
    /// because `' ' < 'T'` — excluding every same-date row regardless of
    /// actual elapsed time.
    #[tokio::test]
    async fn same_calendar_date_key_survives_rehydrate_window() {
        let store = memory_store().await;
        store.alerted_keys().add_alerted_message("1_1").await.unwrap();

        let recent = store.alerted_keys().get_recent_alerted_ids(24).await.unwrap();
        assert_eq!(recent, vec!["1_1".to_string()]);

        // Directly confirm the stored column itself is RFC3339, matching
        // the comparand shape the queries bind.
        let row: (String,) = sqlx::query_as("SELECT alerted_at FROM alerted_messages WHERE msg_key = '1_1'")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert!(row.0.contains('T') && row.0.ends_with('Z'), "alerted_at must be RFC3339, got {:?}", row.0);
    }
}
