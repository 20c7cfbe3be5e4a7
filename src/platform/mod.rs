// src/platform/mod.rs
// The boundary between the Ingestion Worker and whatever MTProto client
// library actually speaks to Telegram. No concrete client ships in this
// crate; `mock` provides a test double that drives the worker's state
// machine and decode path without a network.

pub mod mock;

use async_trait::async_trait;

use crate::error::PlatformError;

/// A single resolved chat the worker is watching.
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    pub member_count: Option<i64>,
}

/// A platform event delivered to a live worker loop.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    NewMessage(RawMessage),
    MessageEdited {
        group_id: i64,
        message_id: i64,
        new_text: Option<String>,
        media_type: Option<String>,
    },
    MessagesDeleted {
        group_id: Option<i64>,
        message_ids: Vec<i64>,
    },
}

/// The undecoded shape of a message as the platform hands it over. Decode
/// rules (sender-name derivation, media classification, forward
/// description, service-message rejection) are applied by the worker via
/// the free functions below, not by the platform client.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: i64,
    pub group_id: i64,
    pub sender_id: Option<i64>,
    pub sender: Option<Sender>,
    pub text: Option<String>,
    pub date: chrono::DateTime<chrono::Utc>,
    pub media: Option<Media>,
    pub forward_from: Option<ForwardHeader>,
    pub reply_to_id: Option<i64>,
    /// Service messages (join/leave/pin/etc.) carry an action and are
    /// dropped by `decode`.
    pub is_service_message: bool,
}

#[derive(Debug, Clone)]
pub enum Sender {
    User {
        first_name: Option<String>,
        last_name: Option<String>,
        username: Option<String>,
        id: i64,
    },
    Channel {
        title: Option<String>,
        id: i64,
    },
    Other {
        id: i64,
    },
}

#[derive(Debug, Clone)]
pub enum Media {
    Photo,
    Video,
    Audio,
    Sticker,
    Document { mime_type: Option<String> },
    WebPage,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ForwardHeader {
    pub from_name: Option<String>,
    pub from_user_id: Option<i64>,
    pub from_channel_id: Option<i64>,
}

/// A live connection to the platform, scoped to a single tenant/session.
/// Implementations must make `connect`/`authenticate` idempotent: calling
/// either again on an already-live session is a no-op success, since the
/// worker's reconnect loop calls them unconditionally.
#[async_trait]
pub trait PlatformSession: Send + Sync {
    async fn connect(&mut self) -> Result<(), PlatformError>;

    async fn authenticate(&mut self) -> Result<(), PlatformError>;

    async fn is_authorized(&self) -> Result<bool, PlatformError>;

    async fn resolve_group(&mut self, identifier: &str) -> Result<ResolvedGroup, PlatformError>;

    /// Walks history backward from `before`, oldest message last returned
    /// first is **not** guaranteed; callers consume in delivery order and
    /// stop early once `stop_at` is reached (exclusive).
    async fn iter_history(
        &mut self,
        group_id: i64,
        before: chrono::DateTime<chrono::Utc>,
        stop_at: Option<chrono::DateTime<chrono::Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<RawMessage>, PlatformError>;

    /// Blocks until an event arrives or the underlying transport drops.
    /// Returning `Ok(None)` signals a clean disconnect (caller should
    /// reconnect); `Err` signals a transport failure.
    async fn next_event(&mut self) -> Result<Option<PlatformEvent>, PlatformError>;

    async fn disconnect(&mut self) -> Result<(), PlatformError>;
}

/// Derives the display name the Store persists as `sender_name`.
pub fn sender_name(sender: Option<&Sender>) -> String {
    match sender {
        None => "Unknown".to_string(),
        Some(Sender::User {
            first_name,
            last_name,
            username,
            id,
        }) => {
            let parts: Vec<&str> = [first_name.as_deref(), last_name.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect();
            if !parts.is_empty() {
                parts.join(" ")
            } else if let Some(u) = username {
                u.clone()
            } else {
                id.to_string()
            }
        }
        Some(Sender::Channel { title, id }) => title.clone().unwrap_or_else(|| id.to_string()),
        Some(Sender::Other { id }) => id.to_string(),
    }
}

/// Classifies a media attachment into the coarse categories the Store
/// records in `media_type`.
pub fn media_type(media: Option<&Media>) -> Option<String> {
    match media? {
        Media::Photo => Some("photo".to_string()),
        Media::Video => Some("video".to_string()),
        Media::Audio => Some("audio".to_string()),
        Media::Sticker => Some("sticker".to_string()),
        Media::Document { mime_type } => match mime_type {
            Some(mime) if mime.contains("video") => Some("video".to_string()),
            Some(mime) if mime.contains("audio") => Some("audio".to_string()),
            Some(mime) if mime.contains("sticker") || mime == "application/x-tgsticker" => {
                Some("sticker".to_string())
            }
            Some(mime) => Some(format!("document ({mime})")),
            None => Some("document".to_string()),
        },
        Media::WebPage => Some("webpage".to_string()),
        Media::Other(name) => Some(name.clone()),
    }
}

/// Describes a forward header the way the Store's `forward_from` column
/// expects: `"<name> / user:<id>"`, `"<name> / channel:<id>"`, just the
/// name, or `"unknown"` if nothing identifying came through.
pub fn forward_from(fwd: Option<&ForwardHeader>) -> Option<String> {
    let fwd = fwd?;
    let mut parts = Vec::new();
    if let Some(name) = &fwd.from_name {
        parts.push(name.clone());
    }
    if let Some(uid) = fwd.from_user_id {
        parts.push(format!("user:{uid}"));
    } else if let Some(cid) = fwd.from_channel_id {
        parts.push(format!("channel:{cid}"));
    }
    Some(if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join(" / ")
    })
}

/// Decodes a `RawMessage` into the Store's `NewMessage` shape, or returns
/// `None` for service messages (join/leave/pin/etc.).
pub fn decode(raw: &RawMessage) -> Option<crate::store::NewMessage> {
    if raw.is_service_message {
        return None;
    }
    Some(crate::store::NewMessage {
        id: raw.id,
        group_id: raw.group_id,
        sender_id: raw.sender_id,
        sender_name: Some(sender_name(raw.sender.as_ref())),
        text: raw.text.clone(),
        date: raw.date.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        media_type: media_type(raw.media.as_ref()),
        forward_from: forward_from(raw.forward_from.as_ref()),
        reply_to_id: raw.reply_to_id,
    })
}
