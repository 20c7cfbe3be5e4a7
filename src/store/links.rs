// src/store/links.rs

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::types::{AggregatedLink, Link};

pub struct LinkOperations {
    pool: SqlitePool,
}

impl LinkOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_links(
        &self,
        group_id: Option<i64>,
        limit: i64,
        block_domains: &[String],
    ) -> Result<Vec<Link>, StoreError> {
        let mut conditions = Vec::new();
        for _ in block_domains {
            conditions.push("LOWER(l.url) NOT LIKE ?".to_string());
        }
        if group_id.is_some() {
            conditions.push("l.group_id = ?".to_string());
        }

        let mut query = String::from(
            "SELECT l.*, g.title as group_title FROM links l LEFT JOIN groups g ON l.group_id = g.id",
        );
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY l.discovered_at DESC LIMIT ?");

        let mut q = sqlx::query(&query);
        for domain in block_domains {
            q = q.bind(format!("%{}%", domain.to_lowercase()));
        }
        if let Some(gid) = group_id {
            q = q.bind(gid);
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows
            .into_iter()
            .map(|row| Link {
                id: row.get("id"),
                url: row.get("url"),
                message_id: row.get("message_id"),
                group_id: row.get("group_id"),
                sender_name: row.get("sender_name"),
                context: row.get("context"),
                discovered_at: row.get("discovered_at"),
                title: row.get("title"),
                description: row.get("description"),
                image_url: row.get("image_url"),
                group_title: row.try_get("group_title").ok(),
            })
            .collect())
    }

    /// Aggregates link occurrences across groups, with domain-blocklist
    /// filtering applied via bound parameters (never string-interpolated
    /// into the query text).
    pub async fn get_links_aggregated(
        &self,
        limit: i64,
        block_domains: &[String],
    ) -> Result<Vec<AggregatedLink>, StoreError> {
        let mut conditions = vec!["1=1".to_string()];
        for _ in block_domains {
            conditions.push("LOWER(l.url) NOT LIKE ?".to_string());
        }

        let query = format!(
            r#"SELECT
                 l.url,
                 COUNT(*) as total_count,
                 COUNT(DISTINCT l.group_id) as group_count,
                 GROUP_CONCAT(DISTINCT g.title) as group_titles,
                 GROUP_CONCAT(DISTINCT l.sender_name) as sender_names,
                 MIN(l.discovered_at) as first_seen,
                 MAX(l.discovered_at) as last_seen
               FROM links l
               LEFT JOIN groups g ON l.group_id = g.id
               WHERE {}
               GROUP BY l.url
               ORDER BY total_count DESC, last_seen DESC
               LIMIT ?"#,
            conditions.join(" AND ")
        );

        let mut q = sqlx::query(&query);
        for domain in block_domains {
            q = q.bind(format!("%{}%", domain.to_lowercase()));
        }
        q = q.bind(limit);

        let rows = q.fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows
            .into_iter()
            .map(|row| AggregatedLink {
                url: row.get("url"),
                total_count: row.get("total_count"),
                group_count: row.get("group_count"),
                group_titles: row.get("group_titles"),
                sender_names: row.get("sender_names"),
                first_seen: row.get("first_seen"),
                last_seen: row.get("last_seen"),
            })
            .collect())
    }
}
