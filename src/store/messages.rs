// src/store/messages.rs

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{error, info};

use crate::error::StoreError;

use super::types::{HourlyBucket, Message, NewMessage};

lazy_static! {
    /// Matches a bare URL up to the first whitespace, bracket/quote, or CJK
    /// closing punctuation mark. The CJK class is load-bearing: without it a
    /// URL immediately followed by Chinese punctuation (very common in chat
    /// text) would swallow the punctuation into the match.
    pub static ref URL_PATTERN: Regex =
        Regex::new(r#"https?://[^\s<>"')\]，。！？、；：）》」』】\u{200b}]+"#).expect("valid URL regex");
}

pub struct MessageOperations {
    pool: SqlitePool,
}

impl MessageOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts one message, extracting and recording any URLs it contains.
    /// Idempotent: a repeated `(id, group_id)` is ignored.
    pub async fn insert_message(&self, msg: &NewMessage) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;
        insert_one(&mut tx, msg).await?;
        tx.commit().await.map_err(StoreError::Query)?;
        Ok(())
    }

    /// Inserts a batch in a single transaction (used for history fetch and
    /// gap recovery). Atomic: either every row in the batch lands or none
    /// does.
    pub async fn insert_messages_batch(&self, messages: &[NewMessage]) -> Result<(), StoreError> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(StoreError::Query)?;
        for msg in messages {
            insert_one(&mut tx, msg).await?;
        }
        tx.commit().await.map_err(StoreError::Query)?;
        info!("batch inserted {} messages", messages.len());
        Ok(())
    }

    pub async fn get_messages(
        &self,
        group_id: Option<i64>,
        since: Option<&str>,
        until: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut query = String::from("SELECT m.*, g.title as group_title FROM messages m LEFT JOIN groups g ON m.group_id = g.id");
        let mut conditions = Vec::new();
        if group_id.is_some() {
            conditions.push("m.group_id = ?");
        }
        if since.is_some() {
            conditions.push("m.date >= ?");
        }
        if until.is_some() {
            conditions.push("m.date <= ?");
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY m.date ASC");
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query(&query);
        if let Some(gid) = group_id {
            q = q.bind(gid);
        }
        if let Some(s) = since {
            q = q.bind(s);
        }
        if let Some(u) = until {
            q = q.bind(u);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows.into_iter().map(row_to_message).collect())
    }

    pub async fn get_message_count(
        &self,
        group_id: Option<i64>,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<i64, StoreError> {
        let mut query = String::from("SELECT COUNT(*) FROM messages");
        let mut conditions = Vec::new();
        if group_id.is_some() {
            conditions.push("group_id = ?");
        }
        if since.is_some() {
            conditions.push("date >= ?");
        }
        if until.is_some() {
            conditions.push("date <= ?");
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        let mut q = sqlx::query_scalar(&query);
        if let Some(gid) = group_id {
            q = q.bind(gid);
        }
        if let Some(s) = since {
            q = q.bind(s);
        }
        if let Some(u) = until {
            q = q.bind(u);
        }
        q.fetch_one(&self.pool).await.map_err(StoreError::Query)
    }

    /// Full-text search via the FTS5 mirror, falling back to a `LIKE` scan
    /// if the FTS table is unusable for any reason.
    pub async fn search_messages(&self, keyword: &str, limit: i64) -> Result<Vec<Message>, StoreError> {
        let fts = sqlx::query(
            r#"SELECT m.*, g.title as group_title
               FROM messages m
               JOIN messages_fts fts ON m.rowid = fts.rowid
               LEFT JOIN groups g ON m.group_id = g.id
               WHERE messages_fts MATCH ?
               ORDER BY m.date DESC LIMIT ?"#,
        )
        .bind(keyword)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;

        let rows = match fts {
            Ok(rows) => rows,
            Err(_) => sqlx::query(
                r#"SELECT m.*, g.title as group_title
                   FROM messages m
                   LEFT JOIN groups g ON m.group_id = g.id
                   WHERE m.text LIKE ?
                   ORDER BY m.date DESC LIMIT ?"#,
            )
            .bind(format!("%{keyword}%"))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?,
        };

        Ok(rows.into_iter().map(row_to_message).collect())
    }

    /// Updates a message's text (and optionally media type). Returns
    /// whether the row actually changed, so callers can skip logging a
    /// no-op re-edit.
    pub async fn update_message_text(
        &self,
        msg_id: i64,
        group_id: i64,
        new_text: Option<&str>,
        media_type: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE messages
               SET text = ?, media_type = COALESCE(?, media_type)
               WHERE id = ? AND group_id = ? AND text IS NOT ?"#,
        )
        .bind(new_text)
        .bind(media_type)
        .bind(msg_id)
        .bind(group_id)
        .bind(new_text)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes messages by id within one group, explicitly retiring their
    /// FTS entries first (contentless FTS requires the delete command
    /// rather than relying solely on the AFTER DELETE trigger timing).
    pub async fn delete_messages(&self, msg_ids: &[i64], group_id: i64) -> Result<i64, StoreError> {
        if msg_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = msg_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let select_sql = format!(
            "SELECT rowid, text, sender_name FROM messages WHERE id IN ({placeholders}) AND group_id = ?"
        );
        let mut q = sqlx::query(&select_sql);
        for id in msg_ids {
            q = q.bind(id);
        }
        q = q.bind(group_id);
        let existing = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        if existing.is_empty() {
            return Ok(0);
        }

        for row in &existing {
            let rowid: i64 = row.get("rowid");
            let text: Option<String> = row.get("text");
            let sender_name: Option<String> = row.get("sender_name");
            let _ = sqlx::query(
                "INSERT INTO messages_fts(messages_fts, rowid, text, sender_name) VALUES ('delete', ?, ?, ?)",
            )
            .bind(rowid)
            .bind(text.unwrap_or_default())
            .bind(sender_name.unwrap_or_default())
            .execute(&self.pool)
            .await;
        }

        let delete_sql = format!("DELETE FROM messages WHERE id IN ({placeholders}) AND group_id = ?");
        let mut q = sqlx::query(&delete_sql);
        for id in msg_ids {
            q = q.bind(id);
        }
        q = q.bind(group_id);
        let result = q.execute(&self.pool).await.map_err(StoreError::Query)?;
        let deleted = result.rows_affected() as i64;
        if deleted > 0 {
            info!("deleted {deleted} messages (group={group_id})");
        }
        Ok(deleted)
    }

    /// Deletes data older than `keep_days`, in 5000-row chunks with a small
    /// yield between chunks so the runtime isn't starved by one enormous
    /// sweep.
    pub async fn cleanup_old_messages(&self, keep_days: i64) -> Result<i64, StoreError> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(keep_days))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let mut total_links = 0i64;
        loop {
            let result = sqlx::query(
                "DELETE FROM links WHERE id IN (SELECT id FROM links WHERE discovered_at < ? LIMIT 5000)",
            )
            .bind(&cutoff)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
            let deleted = result.rows_affected() as i64;
            total_links += deleted;
            if deleted < 5000 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let mut total_msgs = 0i64;
        loop {
            let result = sqlx::query(
                "DELETE FROM messages WHERE rowid IN (SELECT rowid FROM messages WHERE date < ? LIMIT 5000)",
            )
            .bind(&cutoff)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
            let deleted = result.rows_affected() as i64;
            total_msgs += deleted;
            if deleted < 5000 {
                break;
            }
            tokio::task::yield_now().await;
        }

        info!("retention sweep: {total_msgs} messages, {total_links} links (cutoff={cutoff})");
        Ok(total_msgs)
    }

    pub async fn get_recent_messages(
        &self,
        limit: i64,
        group_id: Option<i64>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut query = String::from("SELECT m.*, g.title as group_title FROM messages m LEFT JOIN groups g ON m.group_id = g.id");
        if group_id.is_some() {
            query.push_str(" WHERE m.group_id = ?");
        }
        query.push_str(" ORDER BY m.date DESC LIMIT ?");

        let mut q = sqlx::query(&query);
        if let Some(gid) = group_id {
            q = q.bind(gid);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        let mut messages: Vec<Message> = rows.into_iter().map(row_to_message).collect();
        messages.reverse();
        Ok(messages)
    }

    pub async fn get_message_trends(&self, hours: i64) -> Result<Vec<HourlyBucket>, StoreError> {
        let since = (chrono::Utc::now() - chrono::Duration::hours(hours))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let rows = sqlx::query(
            r#"SELECT strftime('%Y-%m-%dT%H:00:00', date) as hour, COUNT(*) as count
               FROM messages WHERE date >= ?
               GROUP BY hour ORDER BY hour ASC"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| HourlyBucket {
                hour: row.get("hour"),
                count: row.get("count"),
            })
            .collect())
    }
}

async fn insert_one(tx: &mut Transaction<'_, Sqlite>, msg: &NewMessage) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO messages
           (id, group_id, sender_id, sender_name, text, date, media_type, forward_from, reply_to_id)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(msg.id)
    .bind(msg.group_id)
    .bind(msg.sender_id)
    .bind(&msg.sender_name)
    .bind(&msg.text)
    .bind(&msg.date)
    .bind(&msg.media_type)
    .bind(&msg.forward_from)
    .bind(msg.reply_to_id)
    .execute(&mut **tx)
    .await;

    if let Err(err) = result {
        error!("failed to insert message (id={}, group_id={}): {err}", msg.id, msg.group_id);
        return Err(StoreError::Query(err));
    }

    if let Some(text) = &msg.text {
        for url in URL_PATTERN.find_iter(text) {
            let url = url.as_str();
            let context: String = text.chars().take(200).collect();
            sqlx::query(
                r#"INSERT OR IGNORE INTO links (url, message_id, group_id, sender_name, context, discovered_at)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(url)
            .bind(msg.id)
            .bind(msg.group_id)
            .bind(&msg.sender_name)
            .bind(context)
            .bind(&msg.date)
            .execute(&mut **tx)
            .await
            .map_err(StoreError::Query)?;
        }
    }

    Ok(())
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        group_id: row.get("group_id"),
        sender_id: row.get("sender_id"),
        sender_name: row.get("sender_name"),
        text: row.get("text"),
        date: row.get("date"),
        media_type: row.get("media_type"),
        forward_from: row.get("forward_from"),
        reply_to_id: row.get("reply_to_id"),
        group_title: row.try_get("group_title").ok(),
    }
}
