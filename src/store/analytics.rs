// src/store/analytics.rs
// Read-side aggregate queries: per-group stats, top senders, activity
// heatmap, today-vs-yesterday comparison, and the Summary ledger.

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::types::{DateRange, GroupStats, HeatmapCell, HourlyBucket, Summary, TopSender};

pub struct AnalyticsOperations {
    pool: SqlitePool,
}

impl AnalyticsOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save_summary(
        &self,
        group_id: Option<i64>,
        period_start: &str,
        period_end: &str,
        message_count: i64,
        content: &str,
        model: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO summaries (group_id, period_start, period_end, message_count, content, model)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(group_id)
        .bind(period_start)
        .bind(period_end)
        .bind(message_count)
        .bind(content)
        .bind(model)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(())
    }

    pub async fn get_latest_summaries(&self, limit: i64) -> Result<Vec<Summary>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT s.*, g.title as group_title
               FROM summaries s
               LEFT JOIN groups g ON s.group_id = g.id
               WHERE s.content NOT LIKE '%failed%' AND s.content NOT LIKE '%❌%'
               ORDER BY s.created_at DESC LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| Summary {
                id: row.get("id"),
                group_id: row.get("group_id"),
                period_start: row.get("period_start"),
                period_end: row.get("period_end"),
                message_count: row.get("message_count"),
                content: row.get("content"),
                model: row.get("model"),
                created_at: row.get("created_at"),
                group_title: row.try_get("group_title").ok(),
            })
            .collect())
    }

    pub async fn get_stats(&self, since: Option<&str>, until: Option<&str>) -> Result<Vec<GroupStats>, StoreError> {
        let mut conditions = Vec::new();
        if since.is_some() {
            conditions.push("m.date >= ?");
        }
        if until.is_some() {
            conditions.push("m.date <= ?");
        }
        let mut query = String::from(
            r#"SELECT
                 g.title,
                 m.group_id,
                 COUNT(*) as message_count,
                 COUNT(DISTINCT COALESCE(CAST(m.sender_id AS TEXT), m.sender_name)) as active_users,
                 MIN(m.date) as first_msg,
                 MAX(m.date) as last_msg
               FROM messages m
               LEFT JOIN groups g ON m.group_id = g.id"#,
        );
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" GROUP BY m.group_id ORDER BY message_count DESC");

        let mut q = sqlx::query(&query);
        if let Some(s) = since {
            q = q.bind(s);
        }
        if let Some(u) = until {
            q = q.bind(u);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows
            .into_iter()
            .map(|row| GroupStats {
                group_id: row.get("group_id"),
                title: row.get("title"),
                message_count: row.get("message_count"),
                active_users: row.get("active_users"),
                first_msg: row.get("first_msg"),
                last_msg: row.get("last_msg"),
            })
            .collect())
    }

    pub async fn get_top_senders(
        &self,
        group_id: Option<i64>,
        since: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TopSender>, StoreError> {
        let mut conditions = Vec::new();
        if group_id.is_some() {
            conditions.push("group_id = ?");
        }
        if since.is_some() {
            conditions.push("date >= ?");
        }
        let mut query = String::from("SELECT sender_name, sender_id, COUNT(*) as msg_count FROM messages");
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" GROUP BY sender_id ORDER BY msg_count DESC LIMIT ?");

        let mut q = sqlx::query(&query);
        if let Some(gid) = group_id {
            q = q.bind(gid);
        }
        if let Some(s) = since {
            q = q.bind(s);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows
            .into_iter()
            .map(|row| TopSender {
                sender_id: row.get("sender_id"),
                sender_name: row.get("sender_name"),
                msg_count: row.get("msg_count"),
            })
            .collect())
    }

    pub async fn get_date_range(&self, since: Option<&str>, until: Option<&str>) -> Result<DateRange, StoreError> {
        let mut conditions = Vec::new();
        if since.is_some() {
            conditions.push("date >= ?");
        }
        if until.is_some() {
            conditions.push("date <= ?");
        }
        let mut query = String::from("SELECT MIN(date) as first_msg, MAX(date) as last_msg, COUNT(*) as total FROM messages");
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        let mut q = sqlx::query(&query);
        if let Some(s) = since {
            q = q.bind(s);
        }
        if let Some(u) = until {
            q = q.bind(u);
        }
        let row = q.fetch_one(&self.pool).await.map_err(StoreError::Query)?;
        Ok(DateRange {
            first_msg: row.get("first_msg"),
            last_msg: row.get("last_msg"),
            total: row.get("total"),
        })
    }

    pub async fn get_heatmap_data(&self, days: i64) -> Result<Vec<HeatmapCell>, StoreError> {
        let since = (chrono::Utc::now() - chrono::Duration::days(days))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let rows = sqlx::query(
            r#"SELECT
                 CAST(strftime('%w', date) AS INTEGER) as dow,
                 CAST(strftime('%H', date) AS INTEGER) as hour,
                 COUNT(*) as count
               FROM messages
               WHERE date >= ?
               GROUP BY dow, hour ORDER BY dow, hour"#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(rows
            .into_iter()
            .map(|row| HeatmapCell {
                dow: row.get("dow"),
                hour: row.get("hour"),
                count: row.get("count"),
            })
            .collect())
    }

    pub async fn get_hourly_comparison(&self) -> Result<(Vec<HourlyBucket>, Vec<HourlyBucket>), StoreError> {
        let now = chrono::Utc::now();
        let today_start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let yesterday_start = today_start - chrono::Duration::days(1);

        let today = sqlx::query(
            r#"SELECT CAST(strftime('%H', date) AS INTEGER) as hour, COUNT(*) as count
               FROM messages WHERE date >= ? GROUP BY hour ORDER BY hour"#,
        )
        .bind(today_start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        let yesterday = sqlx::query(
            r#"SELECT CAST(strftime('%H', date) AS INTEGER) as hour, COUNT(*) as count
               FROM messages WHERE date >= ? AND date < ? GROUP BY hour ORDER BY hour"#,
        )
        .bind(yesterday_start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .bind(today_start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        let to_buckets = |rows: Vec<sqlx::sqlite::SqliteRow>| {
            rows.into_iter()
                .map(|row| {
                    let hour: i64 = row.get("hour");
                    HourlyBucket {
                        hour: hour.to_string(),
                        count: row.get("count"),
                    }
                })
                .collect::<Vec<_>>()
        };

        Ok((to_buckets(today), to_buckets(yesterday)))
    }
}
