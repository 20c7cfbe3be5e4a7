// src/alerts/mod.rs
// Keyword matching with FIFO-bounded deduplication, persisted across
// restarts. Invoked inline on every ingested message; never lets a
// notification failure or a dedup-persistence hiccup propagate back into
// the ingestion path that called it.

use std::collections::{HashSet, VecDeque};

use chrono::{FixedOffset, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::StoreError;
use crate::notify::BotNotifier;
use crate::store::{Message, Store};

/// Max size of the in-memory dedup FIFO/set pair.
const DEDUP_CAPACITY: usize = 2000;
/// Persisted-key retention window; strictly greater than the rehydrate
/// window so keys near the boundary survive a restart.
const PERSIST_HOURS: i64 = 48;
const REHYDRATE_HOURS: i64 = 24;
/// Platform-side wall clock the notification timestamp is rendered in.
const DISPLAY_OFFSET_HOURS: i32 = 8;

const BODY_TRUNCATE_CHARS: usize = 300;

struct Dedup {
    queue: VecDeque<String>,
    set: HashSet<String>,
}

impl Dedup {
    fn new() -> Self {
        Self {
            queue: VecDeque::with_capacity(DEDUP_CAPACITY),
            set: HashSet::with_capacity(DEDUP_CAPACITY),
        }
    }

    /// Returns `true` if `key` was newly inserted (not seen before).
    fn offer(&mut self, key: String) -> bool {
        if self.set.contains(&key) {
            return false;
        }
        if self.queue.len() >= DEDUP_CAPACITY {
            if let Some(evicted) = self.queue.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.queue.push_back(key.clone());
        self.set.insert(key);
        true
    }
}

pub struct AlertEngine {
    store: Store,
    notifier: BotNotifier,
    owner_id: Option<i64>,
    /// Precompiled (lowercased) keyword list; empty short-circuits every
    /// check before touching Settings.
    keywords: Vec<String>,
    config_enabled_default: bool,
    dedup: Mutex<Dedup>,
}

impl AlertEngine {
    pub fn new(
        store: Store,
        notifier: BotNotifier,
        owner_id: Option<i64>,
        keywords: Vec<String>,
        config_enabled_default: bool,
    ) -> Self {
        Self {
            store,
            notifier,
            owner_id,
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            config_enabled_default,
            dedup: Mutex::new(Dedup::new()),
        }
    }

    /// Loads keys alerted in the last 24h from Store and rehydrates the
    /// in-memory FIFO/set in the same (oldest-first) order they were
    /// originally emitted. Call once at startup, before any `check` call.
    pub async fn rehydrate(&self) -> Result<(), StoreError> {
        let keys = self.store.alerted_keys().get_recent_alerted_ids(REHYDRATE_HOURS).await?;
        let mut dedup = self.dedup.lock().await;
        for key in keys {
            dedup.offer(key);
        }
        Ok(())
    }

    /// Checks `message` against the keyword list and, on a fresh hit,
    /// pushes a notification to the owner. Returns `Ok(())` unconditionally
    /// on the happy and not-matched paths; persistence/notification
    /// failures are logged, never returned: a notification outage must
    /// never block ingestion.
    pub async fn check(&self, message: &Message, group_name: &str) -> Result<(), StoreError> {
        if self.keywords.is_empty() {
            return Ok(());
        }
        // Read fresh from Settings on every check so operators can toggle
        // at runtime; falls back to the file-config default when unset.
        let enabled = self
            .store
            .settings()
            .get_bool("alerts.enabled", self.config_enabled_default)
            .await?;
        if !enabled {
            return Ok(());
        }

        let Some(text) = &message.text else {
            return Ok(());
        };
        let lower = text.to_lowercase();
        let matched: Vec<&str> = self
            .keywords
            .iter()
            .filter(|kw| lower.contains(kw.as_str()))
            .map(|kw| kw.as_str())
            .collect();
        if matched.is_empty() {
            return Ok(());
        }

        let key = format!("{}_{}", message.group_id, message.id);
        let is_new = {
            let mut dedup = self.dedup.lock().await;
            dedup.offer(key.clone())
        };
        if !is_new {
            return Ok(());
        }

        // Persistence is best-effort: a write failure is logged by
        // `add_alerted_message` itself and never blocks notification.
        self.store.alerted_keys().add_alerted_message(&key).await?;

        if let Some(owner_id) = self.owner_id {
            let text = format_notification(&matched, group_name, message, text);
            if !self.notifier.send_message(owner_id, &text).await {
                warn!("alert notification failed for key {key}");
            }
        }

        Ok(())
    }

    /// Deletes dedup keys older than the persisted horizon. Run on a
    /// periodic sweep alongside retention cleanup.
    pub async fn prune(&self) -> Result<(), StoreError> {
        self.store.alerted_keys().cleanup_old_alerts(PERSIST_HOURS).await
    }
}

fn format_notification(matched: &[&str], group_name: &str, message: &Message, body: &str) -> String {
    let offset = FixedOffset::east_opt(DISPLAY_OFFSET_HOURS * 3600).unwrap();
    let time = Utc::now().with_timezone(&offset).format("%H:%M:%S");
    let sender = message.sender_name.as_deref().unwrap_or("unknown");
    let truncated = truncate_body(body);
    format!(
        "🔔 Keyword alert «{}»\nGroup: {}\nSender: {}\nTime: {}\n\n{}",
        matched.join("», «"),
        group_name,
        sender,
        time,
        truncated,
    )
}

fn truncate_body(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() <= BODY_TRUNCATE_CHARS {
        return body.to_string();
    }
    let mut out: String = chars[..BODY_TRUNCATE_CHARS].iter().collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_bound_respected() {
        let mut dedup = Dedup::new();
        for i in 0..5000 {
            dedup.offer(format!("key-{i}"));
        }
        assert!(dedup.set.len() <= DEDUP_CAPACITY);
        assert_eq!(dedup.queue.len(), dedup.set.len());
        // The most recent DEDUP_CAPACITY distinct keys must all be present.
        for i in (5000 - DEDUP_CAPACITY)..5000 {
            assert!(dedup.set.contains(&format!("key-{i}")), "missing key-{i}");
        }
    }

    #[test]
    fn repeated_key_is_not_a_fresh_offer() {
        let mut dedup = Dedup::new();
        assert!(dedup.offer("x".to_string()));
        assert!(!dedup.offer("x".to_string()));
    }

    #[test]
    fn truncates_long_body_with_ellipsis() {
        let body = "a".repeat(400);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), BODY_TRUNCATE_CHARS + 1);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn short_body_untouched() {
        assert_eq!(truncate_body("short"), "short");
    }
}
