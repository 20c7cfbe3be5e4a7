// src/store/jobs.rs
// Job Registry: persists the lifecycle of each async summarization run so
// a client can reconnect to an in-flight job across restarts or reloads.

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::types::{JobStatus, SummaryJob, SummaryJobUpdate};

pub struct JobOperations {
    pool: SqlitePool,
}

impl JobOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_summary_job(
        &self,
        job_id: &str,
        group_id: Option<i64>,
        hours: i64,
        mode: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO summary_jobs (id, group_id, hours, mode, status, progress, progress_text)
               VALUES (?, ?, ?, ?, 'running', 0, 'initializing job...')"#,
        )
        .bind(job_id)
        .bind(group_id)
        .bind(hours)
        .bind(mode)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Partial update: only the `Some` fields in `update` are written;
    /// `updated_at` always advances.
    pub async fn update_summary_job(&self, job_id: &str, update: &SummaryJobUpdate) -> Result<(), StoreError> {
        let mut sets = Vec::new();
        if update.status.is_some() {
            sets.push("status = ?");
        }
        if update.progress.is_some() {
            sets.push("progress = ?");
        }
        if update.progress_text.is_some() {
            sets.push("progress_text = ?");
        }
        if update.result.is_some() {
            sets.push("result = ?");
        }
        if update.error_msg.is_some() {
            sets.push("error_msg = ?");
        }
        if sets.is_empty() {
            return Ok(());
        }
        sets.push("updated_at = datetime('now')");

        let query = format!("UPDATE summary_jobs SET {} WHERE id = ?", sets.join(", "));
        let mut q = sqlx::query(&query);
        if let Some(status) = update.status {
            q = q.bind(status.as_str());
        }
        if let Some(progress) = update.progress {
            q = q.bind(progress);
        }
        if let Some(text) = &update.progress_text {
            q = q.bind(text);
        }
        if let Some(result) = &update.result {
            q = q.bind(result);
        }
        if let Some(err) = &update.error_msg {
            q = q.bind(err);
        }
        q = q.bind(job_id);

        q.execute(&self.pool).await.map_err(StoreError::Query)?;
        Ok(())
    }

    pub async fn get_summary_job(&self, job_id: &str) -> Result<Option<SummaryJob>, StoreError> {
        let row = sqlx::query("SELECT * FROM summary_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(row.map(|row| SummaryJob {
            id: row.get("id"),
            group_id: row.get("group_id"),
            hours: row.get("hours"),
            mode: row.get("mode"),
            status: row.get("status"),
            progress: row.get("progress"),
            progress_text: row.get("progress_text"),
            result: row.get("result"),
            error_msg: row.get("error_msg"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}

impl SummaryJobUpdate {
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, progress: i64, text: impl Into<String>) -> Self {
        self.progress = Some(progress);
        self.progress_text = Some(text.into());
        self
    }

    pub fn result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error_msg = Some(error.into());
        self
    }
}
