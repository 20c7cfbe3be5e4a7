// src/store/types.rs
// Row types shared across the store's operation modules.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub member_count: Option<i64>,
    pub updated_at: String,
}

/// A decoded platform event, ready to persist. Produced by the ingestion
/// worker's decode step (see `platform::decode`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub date: String,
    pub media_type: Option<String>,
    pub forward_from: Option<String>,
    pub reply_to_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub text: Option<String>,
    pub date: String,
    pub media_type: Option<String>,
    pub forward_from: Option<String>,
    pub reply_to_id: Option<i64>,
    pub group_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub url: String,
    pub message_id: i64,
    pub group_id: i64,
    pub sender_name: Option<String>,
    pub context: Option<String>,
    pub discovered_at: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub group_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedLink {
    pub url: String,
    pub total_count: i64,
    pub group_count: i64,
    pub group_titles: Option<String>,
    pub sender_names: Option<String>,
    pub first_seen: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    pub group_id: i64,
    pub title: Option<String>,
    pub message_count: i64,
    pub active_users: i64,
    pub first_msg: Option<String>,
    pub last_msg: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopSender {
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub msg_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub dow: i64,
    pub hour: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DateRange {
    pub first_msg: Option<String>,
    pub last_msg: Option<String>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub group_id: Option<i64>,
    pub period_start: String,
    pub period_end: String,
    pub message_count: i64,
    pub content: String,
    pub model: Option<String>,
    pub created_at: String,
    pub group_title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "done" => JobStatus::Done,
            "error" => JobStatus::Error,
            _ => JobStatus::Running,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryJob {
    pub id: String,
    pub group_id: Option<i64>,
    pub hours: Option<i64>,
    pub mode: Option<String>,
    pub status: String,
    pub progress: i64,
    pub progress_text: Option<String>,
    pub result: Option<String>,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub api_id: Option<i64>,
    pub api_hash: Option<String>,
    pub phone: String,
    pub session_name: String,
    pub is_active: bool,
    pub created_at: String,
}

/// A partial update to a `SummaryJob` row. Only `Some` fields are written;
/// `updated_at` is always advanced.
#[derive(Debug, Clone, Default)]
pub struct SummaryJobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i64>,
    pub progress_text: Option<String>,
    pub result: Option<String>,
    pub error_msg: Option<String>,
}
