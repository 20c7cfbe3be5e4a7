// src/store/groups.rs

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::types::Group;

pub struct GroupOperations {
    pool: SqlitePool,
}

impl GroupOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_group(
        &self,
        group_id: i64,
        title: &str,
        username: Option<&str>,
        member_count: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        sqlx::query(
            r#"INSERT INTO groups (id, title, username, member_count, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 username = excluded.username,
                 member_count = excluded.member_count,
                 updated_at = excluded.updated_at"#,
        )
        .bind(group_id)
        .bind(title)
        .bind(username)
        .bind(member_count)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(())
    }

    pub async fn get_groups(&self) -> Result<Vec<Group>, StoreError> {
        let rows = sqlx::query("SELECT * FROM groups ORDER BY title")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| Group {
                id: row.get("id"),
                title: row.get("title"),
                username: row.get("username"),
                member_count: row.get("member_count"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}
