// src/store/settings.rs
// Lightweight key/value store for runtime-toggleable options (e.g. the
// alerts on/off switch), so operators can flip them without a redeploy.

use std::collections::HashMap;

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

pub struct SettingsOperations {
    pool: SqlitePool,
}

impl SettingsOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        Ok(match self.get(key).await? {
            Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
            None => default,
        })
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO settings (key, value, updated_at)
               VALUES (?, ?, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(())
    }

    pub async fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.set(key, if value { "true" } else { "false" }).await
    }

    pub async fn all(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect())
    }
}
