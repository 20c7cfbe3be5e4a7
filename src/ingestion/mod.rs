// src/ingestion/mod.rs
// The Ingestion Worker: one long-lived task per Tenant session, walking
// `Init → Authenticating → Resolving → Catching-up → Live →
// [Disconnected → Reconnecting → Live]* → Stopped`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alerts::AlertEngine;
use crate::config::GroupTarget;
use crate::error::PlatformError;
use crate::platform::{self, PlatformEvent, PlatformSession, RawMessage, ResolvedGroup};
use crate::store::{Message, NewMessage, Store};

const INITIAL_BACKOFF: Duration = Duration::from_secs(5);
const MAX_BACKOFF: Duration = Duration::from_secs(300);
/// A gap shorter than this is noise (clock skew, a momentary blip), not a
/// real outage worth a backfill pass.
const MIN_GAP_SECS: i64 = 30;
const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 3600);
const DEFAULT_RETENTION_DAYS: i64 = 90;

pub struct WorkerConfig {
    pub tenant_id: i64,
    pub groups: Vec<GroupTarget>,
    pub retention_days: i64,
}

/// One tenant's long-lived ingestion task. Holds a borrowed `Store` handle
/// (never a raw connection) and, optionally, a shared `AlertEngine`.
pub struct Worker {
    session: Box<dyn PlatformSession>,
    store: Store,
    alerts: Option<Arc<AlertEngine>>,
    config: WorkerConfig,
    monitored: HashMap<i64, ResolvedGroup>,
    /// Serializes gap-recovery batch inserts across every worker sharing
    /// this `Store`, so one worker's multi-thousand-row backfill can't
    /// starve another worker's live stream of write bandwidth.
    backfill_lock: Arc<AsyncMutex<()>>,
    last_seen: Option<DateTime<Utc>>,
    /// Cancelled by `SessionPool::stop_tenant`/`stop_all` to request a
    /// cooperative shutdown. `cancel_token()` hands a clone to the pool
    /// before the worker is moved into its task.
    cancel: CancellationToken,
}

impl Worker {
    pub fn new(
        session: Box<dyn PlatformSession>,
        store: Store,
        alerts: Option<Arc<AlertEngine>>,
        config: WorkerConfig,
        backfill_lock: Arc<AsyncMutex<()>>,
    ) -> Self {
        Self {
            session,
            store,
            alerts,
            config,
            monitored: HashMap::new(),
            backfill_lock,
            last_seen: None,
            cancel: CancellationToken::new(),
        }
    }

    /// A clone of this worker's cancellation token. The pool holds onto
    /// this and cancels it to request shutdown; the worker itself only
    /// ever observes it, never cancels itself.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drives the whole state machine. Returns only on an unrecoverable
    /// authentication failure; transport errors are absorbed by the
    /// reconnect loop and never propagate out of `live_loop`. On a
    /// cooperative shutdown request (`cancel_token()` cancelled), drains
    /// back out of `live_loop` and disconnects the Platform client before
    /// returning — every Store write up to that point has already
    /// committed, since each live-message insert is its own transaction.
    pub async fn run(mut self) -> Result<(), PlatformError> {
        self.authenticate().await?;
        self.resolve_groups().await;
        self.catch_up().await?;
        self.spawn_sweepers();
        info!(tenant_id = self.config.tenant_id, "worker entering Live state");
        self.live_loop().await;
        if let Err(e) = self.session.disconnect().await {
            warn!(tenant_id = self.config.tenant_id, "error disconnecting platform session: {e}");
        }
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), PlatformError> {
        self.session.connect().await?;
        if self.session.is_authorized().await? {
            info!(tenant_id = self.config.tenant_id, "session already authorized");
            return Ok(());
        }
        // `authenticate` is specified as idempotent: a second call on an
        // already-authorized session is a no-op success.
        self.session.authenticate().await?;
        info!(tenant_id = self.config.tenant_id, "authenticated");
        Ok(())
    }

    async fn resolve_groups(&mut self) {
        let targets = self.config.groups.clone();
        for target in &targets {
            let Some(identifier) = target.identifier() else {
                warn!("group target with neither id nor username, skipping");
                continue;
            };
            match self.session.resolve_group(&identifier).await {
                Ok(resolved) => {
                    if let Err(e) = self
                        .store
                        .groups()
                        .upsert_group(resolved.id, &resolved.title, resolved.username.as_deref(), resolved.member_count)
                        .await
                    {
                        error!("failed to upsert resolved group {}: {e}", resolved.id);
                    }
                    self.monitored.insert(resolved.id, resolved);
                }
                Err(e) => {
                    // A resolution failure for one group must not abort
                    // the worker.
                    warn!("could not resolve group {identifier}: {e}");
                }
            }
        }
    }

    /// Backfills every monitored group from "now" back to the last
    /// persisted message date, if the gap exceeds `MIN_GAP_SECS`.
    async fn catch_up(&mut self) -> Result<(), PlatformError> {
        let last_date = self.store.analytics().get_date_range(None, None).await.ok().and_then(|r| r.last_msg);
        let Some(last_date) = last_date else {
            return Ok(());
        };
        let Ok(last_seen) = DateTime::parse_from_rfc3339(&last_date) else {
            return Ok(());
        };
        let last_seen = last_seen.with_timezone(&Utc);
        let gap = Utc::now() - last_seen;
        if gap.num_seconds() < MIN_GAP_SECS {
            return Ok(());
        }

        let group_ids: Vec<i64> = self.monitored.keys().copied().collect();
        for group_id in group_ids {
            let now = Utc::now();
            let history = self.session.iter_history(group_id, now, Some(last_seen), None).await;
            let history = match history {
                Ok(h) => h,
                Err(e) => {
                    warn!("gap recovery failed for group {group_id}: {e}");
                    continue;
                }
            };
            let decoded: Vec<NewMessage> = history.iter().filter_map(platform::decode).collect();
            if decoded.is_empty() {
                continue;
            }
            let recovered = decoded.len();
            {
                // Only the batch-insert itself needs to be serialized
                // across workers; resolving history can run fully
                // concurrently.
                let _guard = self.backfill_lock.lock().await;
                self.store.messages().insert_messages_batch(&decoded).await.map_err(|e| {
                    PlatformError::Transport(anyhow::anyhow!("gap recovery insert failed: {e}"))
                })?;
            }
            info!(group_id, recovered, "gap recovery complete");
        }
        self.last_seen = Some(Utc::now());
        Ok(())
    }

    fn spawn_sweepers(&self) {
        let retention_days = self.config.retention_days;
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let days = store
                    .settings()
                    .get("monitoring.keep_days")
                    .await
                    .ok()
                    .flatten()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(if retention_days > 0 { retention_days } else { DEFAULT_RETENTION_DAYS });
                match store.messages().cleanup_old_messages(days).await {
                    Ok(deleted) => info!("retention sweep removed {deleted} messages (keep_days={days})"),
                    Err(e) => error!("retention sweep failed: {e}"),
                }
            }
        });

        if let Some(alerts) = self.alerts.clone() {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(SWEEP_INTERVAL);
                loop {
                    interval.tick().await;
                    if let Err(e) = alerts.prune().await {
                        error!("alert dedup prune failed: {e}");
                    }
                }
            });
        }
    }

    async fn live_loop(&mut self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(tenant_id = self.config.tenant_id, "shutdown requested, leaving Live state");
                    return;
                }
                result = self.session.next_event() => result,
            };
            match event {
                Ok(Some(event)) => {
                    if let Err(e) = self.handle_event(event).await {
                        // An unknown exception in the event handler must
                        // not crash the worker.
                        error!(tenant_id = self.config.tenant_id, "event handler error: {e}");
                    }
                }
                Ok(None) => {
                    warn!(tenant_id = self.config.tenant_id, "disconnected, reconnecting");
                    match self.reconnect_with_backoff(backoff).await {
                        Some(next) => backoff = next,
                        None => return,
                    }
                }
                Err(PlatformError::RateLimited { wait_secs }) => {
                    warn!(tenant_id = self.config.tenant_id, "rate limited, waiting {wait_secs}s");
                    if !self.cancellable_sleep(Duration::from_secs(wait_secs)).await {
                        return;
                    }
                    let _ = self.try_reconnect().await;
                    if let Err(e) = self.catch_up().await {
                        warn!("post-reconnect gap recovery failed: {e}");
                    }
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => {
                    error!(tenant_id = self.config.tenant_id, "transport error: {e}");
                    match self.reconnect_with_backoff(backoff).await {
                        Some(next) => backoff = next,
                        None => return,
                    }
                }
            }
        }
    }

    async fn try_reconnect(&mut self) -> Result<(), PlatformError> {
        self.session.connect().await?;
        self.session.authenticate().await
    }

    /// Sleeps for `dur` unless cancellation is requested first. Returns
    /// `false` if cancelled, so callers can bail out of the reconnect loop
    /// instead of blocking shutdown behind a long backoff.
    async fn cancellable_sleep(&self, dur: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(dur) => true,
        }
    }

    /// Attempts reconnect with exponential backoff (doubling, capped at
    /// 300s). On success, resets backoff to the initial value and runs gap
    /// recovery again before returning `Some(next_backoff)`. Returns `None`
    /// if cancellation was requested while waiting out the backoff, so the
    /// caller can leave `live_loop` without blocking shutdown.
    async fn reconnect_with_backoff(&mut self, mut backoff: Duration) -> Option<Duration> {
        loop {
            if !self.cancellable_sleep(backoff).await {
                return None;
            }
            match self.try_reconnect().await {
                Ok(()) => {
                    info!(tenant_id = self.config.tenant_id, "reconnected");
                    if let Err(e) = self.catch_up().await {
                        warn!("post-reconnect gap recovery failed: {e}");
                    }
                    return Some(INITIAL_BACKOFF);
                }
                Err(e) => {
                    warn!(tenant_id = self.config.tenant_id, "reconnect failed: {e}, backing off {backoff:?}");
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn handle_event(&mut self, event: PlatformEvent) -> Result<(), PlatformError> {
        match event {
            PlatformEvent::NewMessage(raw) => self.handle_new_message(raw).await,
            PlatformEvent::MessageEdited { group_id, message_id, new_text, media_type } => {
                self.handle_edit(group_id, message_id, new_text, media_type).await
            }
            PlatformEvent::MessagesDeleted { group_id, message_ids } => {
                self.handle_delete(group_id, message_ids).await
            }
        }
    }

    async fn handle_new_message(&mut self, raw: RawMessage) -> Result<(), PlatformError> {
        let Some(decoded) = platform::decode(&raw) else {
            return Ok(());
        };
        if !self.monitored.contains_key(&decoded.group_id) {
            return Ok(());
        }

        self.store
            .messages()
            .insert_message(&decoded)
            .await
            .map_err(|e| PlatformError::Transport(anyhow::anyhow!("insert failed: {e}")))?;
        self.last_seen = Some(Utc::now());

        if let Some(alerts) = &self.alerts {
            let group_name = self
                .monitored
                .get(&decoded.group_id)
                .map(|g| g.title.clone())
                .unwrap_or_else(|| decoded.group_id.to_string());
            let row = Message {
                id: decoded.id,
                group_id: decoded.group_id,
                sender_id: decoded.sender_id,
                sender_name: decoded.sender_name.clone(),
                text: decoded.text.clone(),
                date: decoded.date.clone(),
                media_type: decoded.media_type.clone(),
                forward_from: decoded.forward_from.clone(),
                reply_to_id: decoded.reply_to_id,
                group_title: Some(group_name.clone()),
            };
            if let Err(e) = alerts.check(&row, &group_name).await {
                error!("alert check failed: {e}");
            }
        }
        Ok(())
    }

    async fn handle_edit(
        &mut self,
        group_id: i64,
        message_id: i64,
        new_text: Option<String>,
        media_type: Option<String>,
    ) -> Result<(), PlatformError> {
        if !self.monitored.contains_key(&group_id) {
            return Ok(());
        }
        let changed = self
            .store
            .messages()
            .update_message_text(message_id, group_id, new_text.as_deref(), media_type.as_deref())
            .await
            .map_err(|e| PlatformError::Transport(anyhow::anyhow!("edit failed: {e}")))?;
        if changed {
            info!(group_id, message_id, "message edited");
        }
        Ok(())
    }

    async fn handle_delete(&mut self, group_id: Option<i64>, message_ids: Vec<i64>) -> Result<(), PlatformError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        if let Some(group_id) = group_id {
            if !self.monitored.contains_key(&group_id) {
                return Ok(());
            }
            let deleted = self
                .store
                .messages()
                .delete_messages(&message_ids, group_id)
                .await
                .map_err(|e| PlatformError::Transport(anyhow::anyhow!("delete failed: {e}")))?;
            if deleted > 0 {
                info!(group_id, deleted, "messages deleted");
            }
            return Ok(());
        }

        // Classic chats don't carry a channel id on delete events: try
        // every monitored group and report whichever one actually had rows
        // to remove.
        let group_ids: Vec<i64> = self.monitored.keys().copied().collect();
        for candidate in group_ids {
            let deleted = self
                .store
                .messages()
                .delete_messages(&message_ids, candidate)
                .await
                .map_err(|e| PlatformError::Transport(anyhow::anyhow!("delete failed: {e}")))?;
            if deleted > 0 {
                info!(group_id = candidate, deleted, "messages deleted (scope inferred)");
                return Ok(());
            }
        }
        Ok(())
    }
}
