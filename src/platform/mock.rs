// src/platform/mock.rs
// A scripted test double for `PlatformSession`. Drives the worker's state
// machine (reconnect, gap recovery, decode path) without a network stack.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformError;

use super::{PlatformEvent, PlatformSession, RawMessage, ResolvedGroup};

/// One scripted disconnect: the session returns `Ok(None)` (clean) or the
/// given error from `next_event`, then the test arranges for a fresh
/// history/event script before the next `connect`.
#[derive(Debug, Clone)]
pub enum ScriptedDrop {
    Clean,
    RateLimited { wait_secs: u64 },
    Transport(String),
}

#[derive(Default)]
struct State {
    connected: bool,
    authorized: bool,
    groups: HashMap<String, ResolvedGroup>,
    /// History available per group, newest first, consumed by `iter_history`.
    history: HashMap<i64, Vec<RawMessage>>,
    /// Live events queued for `next_event`, drained in order.
    events: VecDeque<PlatformEvent>,
    /// If set, the next `next_event` call returns this drop instead of
    /// draining `events`.
    pending_drop: Option<ScriptedDrop>,
    connect_count: u32,
    disconnect_count: u32,
}

/// A fully scripted `PlatformSession`. Tests populate groups/history/events
/// up front via the `Mock*` builder methods, then drive the worker against
/// it.
pub struct MockSession {
    state: Mutex<State>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_group(self, identifier: &str, group: ResolvedGroup) -> Self {
        self.state.lock().unwrap().groups.insert(identifier.to_string(), group);
        self
    }

    pub fn with_history(self, group_id: i64, messages: Vec<RawMessage>) -> Self {
        self.state.lock().unwrap().history.insert(group_id, messages);
        self
    }

    pub fn push_event(&self, event: PlatformEvent) {
        self.state.lock().unwrap().events.push_back(event);
    }

    pub fn schedule_drop(&self, drop: ScriptedDrop) {
        self.state.lock().unwrap().pending_drop = Some(drop);
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().unwrap().connect_count
    }

    pub fn disconnect_count(&self) -> u32 {
        self.state.lock().unwrap().disconnect_count
    }
}

#[async_trait]
impl PlatformSession for MockSession {
    async fn connect(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.connected = true;
        state.connect_count += 1;
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<(), PlatformError> {
        // Idempotent: a second call on an already-authorized session is a
        // no-op success.
        self.state.lock().unwrap().authorized = true;
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, PlatformError> {
        Ok(self.state.lock().unwrap().authorized)
    }

    async fn resolve_group(&mut self, identifier: &str) -> Result<ResolvedGroup, PlatformError> {
        self.state
            .lock()
            .unwrap()
            .groups
            .get(identifier)
            .cloned()
            .ok_or_else(|| PlatformError::UnresolvedGroup(identifier.to_string()))
    }

    async fn iter_history(
        &mut self,
        group_id: i64,
        _before: DateTime<Utc>,
        stop_at: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<RawMessage>, PlatformError> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<RawMessage> = state
            .history
            .get(&group_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .take_while(|m| stop_at.is_none_or(|stop| m.date > stop))
            .collect();
        if let Some(limit) = limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn next_event(&mut self) -> Result<Option<PlatformEvent>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(drop) = state.pending_drop.take() {
            state.connected = false;
            return match drop {
                ScriptedDrop::Clean => Ok(None),
                ScriptedDrop::RateLimited { wait_secs } => Err(PlatformError::RateLimited { wait_secs }),
                ScriptedDrop::Transport(msg) => Err(PlatformError::Transport(anyhow::anyhow!(msg))),
            };
        }
        Ok(state.events.pop_front())
    }

    async fn disconnect(&mut self) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.disconnect_count += 1;
        Ok(())
    }
}
