// src/summarizer/mod.rs
// Chunked map-reduce summarization over message windows, fanning out over
// a shared credential-slot pool and streaming progress to any observer.

pub mod chunking;
pub mod format;

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::join_all;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::AiConfig;
use crate::error::{StoreError, SummarizerError};
use crate::llm::{prompts, Client, CredentialPool};
use crate::store::{JobStatus, Store, SummaryJobUpdate};

pub use chunking::ProgressFn;

const DEFAULT_WINDOW_HOURS: i64 = 24;
const NO_RECORDS_SENTINEL: &str = "No records found for the selected window.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// One pass over the whole (optionally single-group) window.
    Quick,
    /// One pass per monitored group, merged with the cross-group overview
    /// prompt.
    PerGroup,
}

impl SummaryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryMode::Quick => "quick",
            SummaryMode::PerGroup => "per_group",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub hours: Option<i64>,
    pub group_id: Option<i64>,
    pub save: bool,
    pub mode: Option<SummaryMode>,
}

impl SummaryRequest {
    /// Resolves `since`/`until` from `hours` or the 24h default.
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let until = self.until.unwrap_or_else(Utc::now);
        let since = self
            .since
            .unwrap_or_else(|| until - ChronoDuration::hours(self.hours.unwrap_or(DEFAULT_WINDOW_HOURS)));
        (since, until)
    }
}

/// Chunked map-reduce summarizer over a shared credential pool. Cheap to
/// clone — `Store` and `Client` are both internally shared handles.
#[derive(Clone)]
pub struct Summarizer {
    store: Store,
    client: Client,
    system_prompt: String,
    model: String,
}

impl Summarizer {
    pub fn new(store: Store, ai_config: &AiConfig) -> Result<Self, SummarizerError> {
        let keys = ai_config.effective_keys();
        if keys.is_empty() {
            return Err(SummarizerError::NoCredentials);
        }
        let pool = Arc::new(CredentialPool::new(keys, ai_config.max_concurrent_per_key));
        let client = Client::new(ai_config.api_url.clone(), ai_config.model.clone(), ai_config.max_tokens, pool);
        let system_prompt = if ai_config.summary_system_prompt.is_empty() {
            prompts::DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            ai_config.summary_system_prompt.clone()
        };
        Ok(Self { store, client, system_prompt, model: ai_config.model.clone() })
    }

    /// Runs one summarization request, optionally persisting the result
    /// and streaming progress. Returns the scrubbed report text (which may
    /// be the `"❌ "`-prefixed failure sentinel — callers decide UX) or a
    /// `StoreError` if the Store itself could not be read/written.
    ///
    /// Registers a `SummaryJob` up front and write-throughs progress/result
    /// to the Job Registry as it runs, so a separate caller (a dashboard
    /// poller, a restarted CLI) can reconnect to this run by job id even
    /// though the id itself isn't returned here — `req.save` callers read
    /// the persisted `summaries` row instead; job-id-aware callers should
    /// use `store.jobs()` directly against a known id if they need to poll.
    pub async fn run(
        &self,
        req: &SummaryRequest,
        mut user_progress: impl FnMut(&str, u32, u32),
    ) -> Result<String, StoreError> {
        let mode = req.mode.unwrap_or(if req.group_id.is_some() { SummaryMode::Quick } else { SummaryMode::PerGroup });
        let hours = req.hours.unwrap_or(DEFAULT_WINDOW_HOURS);

        let job_id = Uuid::new_v4().to_string();
        self.store.jobs().create_summary_job(&job_id, req.group_id, hours, mode.as_str()).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<(String, u32, u32)>();
        let job_store = self.store.clone();
        let drain_job_id = job_id.clone();
        let drain = tokio::spawn(async move {
            while let Some((stage, step, total)) = rx.recv().await {
                let pct = if total > 0 { (step as i64 * 100) / total as i64 } else { 0 };
                let _ = job_store
                    .jobs()
                    .update_summary_job(&drain_job_id, &SummaryJobUpdate::default().progress(pct, stage))
                    .await;
            }
        });

        let result = self.run_tracked(req, mode, &mut user_progress, &tx).await;
        drop(tx);
        let _ = drain.await;

        match &result {
            Ok(scrubbed) => {
                let update = if scrubbed.starts_with('❌') {
                    SummaryJobUpdate::default().status(JobStatus::Error).error(scrubbed.clone())
                } else {
                    SummaryJobUpdate::default().status(JobStatus::Done).result(scrubbed.clone())
                };
                let _ = self.store.jobs().update_summary_job(&job_id, &update).await;
            }
            Err(e) => {
                let update = SummaryJobUpdate::default().status(JobStatus::Error).error(e.to_string());
                let _ = self.store.jobs().update_summary_job(&job_id, &update).await;
            }
        }

        result
    }

    async fn run_tracked(
        &self,
        req: &SummaryRequest,
        mode: SummaryMode,
        user_progress: &mut impl FnMut(&str, u32, u32),
        tx: &mpsc::UnboundedSender<(String, u32, u32)>,
    ) -> Result<String, StoreError> {
        let mut progress = |stage: &str, step: u32, total: u32| {
            user_progress(stage, step, total);
            let _ = tx.send((stage.to_string(), step, total));
        };

        progress("resolving window", 0, 10);
        let (since, until) = req.window();
        let since_s = since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let until_s = until.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let report = match mode {
            SummaryMode::Quick => self.run_quick(req.group_id, &since_s, &until_s, &mut progress).await?,
            SummaryMode::PerGroup => self.run_per_group(&since_s, &until_s, &mut progress).await?,
        };

        let scrubbed = crate::llm::scrub(&report);
        progress("done", 10, 10);

        if req.save && !scrubbed.starts_with('❌') && scrubbed != NO_RECORDS_SENTINEL {
            let count = self.store.messages().get_message_count(req.group_id, Some(&since_s), Some(&until_s)).await?;
            self.store
                .analytics()
                .save_summary(req.group_id, &since_s, &until_s, count, &scrubbed, Some(&self.model))
                .await?;
        }

        Ok(scrubbed)
    }

    async fn run_quick(
        &self,
        group_id: Option<i64>,
        since: &str,
        until: &str,
        progress: &mut impl FnMut(&str, u32, u32),
    ) -> Result<String, StoreError> {
        progress("loading messages", 1, 10);
        let messages = self.store.messages().get_messages(group_id, Some(since), Some(until), None).await?;
        if messages.is_empty() {
            progress("done", 10, 10);
            return Ok(NO_RECORDS_SENTINEL.to_string());
        }

        let mut sub_progress = |stage: &str, step: u32, total: u32| progress(stage, step, total);
        let report = chunking::summarize_window(&self.client, &self.system_prompt, &messages, &mut sub_progress).await;
        Ok(report)
    }

    async fn run_per_group(
        &self,
        since: &str,
        until: &str,
        progress: &mut impl FnMut(&str, u32, u32),
    ) -> Result<String, StoreError> {
        progress("loading groups", 1, 10);
        let groups = self.store.groups().get_groups().await?;

        let mut per_group_work = Vec::new();
        for group in &groups {
            let messages = self
                .store
                .messages()
                .get_messages(Some(group.id), Some(since), Some(until), None)
                .await?;
            if !messages.is_empty() {
                per_group_work.push((group.title.clone(), messages));
            }
        }

        if per_group_work.is_empty() {
            progress("done", 10, 10);
            return Ok(NO_RECORDS_SENTINEL.to_string());
        }

        progress("summarizing groups", 3, 10);
        let futures = per_group_work.iter().map(|(title, messages)| {
            let mut noop = |_: &str, _: u32, _: u32| {};
            async move {
                let report = chunking::summarize_window(&self.client, &self.system_prompt, messages, &mut noop).await;
                (title.clone(), report)
            }
        });
        let per_group_results = join_all(futures).await;
        progress("merging group overviews", 7, 10);

        let successful: Vec<(String, String)> = per_group_results.into_iter().filter(|(_, r)| !r.starts_with('❌')).collect();
        if successful.is_empty() {
            return Ok("❌ all per-group summaries failed".to_string());
        }

        let joined = successful
            .iter()
            .map(|(title, report)| format!("[{title}]\n{report}"))
            .collect::<Vec<_>>()
            .join(prompts::GROUP_SEPARATOR);

        let overview_prompt = prompts::cross_group_overview_prompt(&joined);
        let overview = match self.client.chat(prompts::MERGE_SYSTEM_PROMPT, &overview_prompt).await {
            Ok(text) => text,
            Err(_) => successful.iter().map(|(_, r)| r.clone()).collect::<Vec<_>>().join("\n---\n"),
        };
        Ok(overview)
    }
}
