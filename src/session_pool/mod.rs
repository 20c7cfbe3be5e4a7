// src/session_pool/mod.rs
// Owns one Ingestion Worker task per tenant: a `JoinHandle` plus a
// `CancellationToken` per task. Stopping a tenant cancels the token and
// waits for the worker to drain out of `live_loop` and disconnect its
// Platform client on its own, falling back to `.abort()` only if it
// doesn't do so within a grace period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::alerts::AlertEngine;
use crate::config::{Config, GroupTarget};
use crate::error::PlatformError;
use crate::ingestion::{Worker, WorkerConfig};
use crate::platform::PlatformSession;
use crate::store::{Store, Tenant};

/// Status snapshot for one tenant's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Stopped,
}

/// Builds a fresh `PlatformSession` for a given tenant. The pool holds no
/// concrete transport dependency; callers supply how a session is
/// constructed (real MTProto client in production, `MockSession` in tests).
pub trait SessionFactory: Send + Sync {
    fn build(&self, tenant: &Tenant) -> Box<dyn PlatformSession>;
}

/// Grace period `stop_tenant`/`stop_all` wait for a worker to drain and
/// disconnect cooperatively before giving up and aborting its task outright.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Manages one long-lived worker task per tenant. Stopping a tenant cancels
/// its `CancellationToken` and waits for the worker's own task to notice,
/// drain, and disconnect its Platform client before returning — every Store
/// write the worker makes commits individually, so this loses at most the
/// in-flight unsaved event, never a half-written row.
pub struct SessionPool {
    store: Store,
    alerts: Option<Arc<AlertEngine>>,
    groups: Vec<GroupTarget>,
    retention_days: i64,
    factory: Box<dyn SessionFactory>,
    backfill_lock: Arc<AsyncMutex<()>>,
    handles: HashMap<i64, (JoinHandle<()>, CancellationToken)>,
}

impl SessionPool {
    pub fn new(store: Store, alerts: Option<Arc<AlertEngine>>, config: &Config, factory: Box<dyn SessionFactory>) -> Self {
        Self {
            store,
            alerts,
            groups: config.groups.clone(),
            retention_days: config.monitoring.keep_days,
            factory,
            backfill_lock: Arc::new(AsyncMutex::new(())),
            handles: HashMap::new(),
        }
    }

    /// Starts a worker for every active tenant in Store. Tenants with no
    /// rows fall back to the single implicit tenant id `0`, so a
    /// single-account deployment never needs a Tenants table entry.
    pub async fn start_all(&mut self) -> Result<(), PlatformError> {
        let tenants = self
            .store
            .tenants()
            .get_tenants(true)
            .await
            .map_err(|e| PlatformError::Transport(anyhow::anyhow!("failed to list tenants: {e}")))?;

        if tenants.is_empty() {
            self.start_tenant(&implicit_tenant());
            return Ok(());
        }
        for tenant in tenants {
            self.start_tenant(&tenant);
        }
        Ok(())
    }

    /// Spawns (or respawns) a single tenant's worker task.
    pub fn start_tenant(&mut self, tenant: &Tenant) {
        if self.handles.contains_key(&tenant.id) {
            warn!(tenant_id = tenant.id, "worker already running, ignoring start");
            return;
        }
        let session = self.factory.build(tenant);
        let worker_config = WorkerConfig {
            tenant_id: tenant.id,
            groups: self.groups.clone(),
            retention_days: self.retention_days,
        };
        let worker = Worker::new(session, self.store.clone(), self.alerts.clone(), worker_config, self.backfill_lock.clone());
        let cancel = worker.cancel_token();
        let tenant_id = tenant.id;
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!(tenant_id, "worker exited with error: {e}");
            }
        });
        info!(tenant_id, "worker started");
        self.handles.insert(tenant_id, (handle, cancel));
    }

    /// Cancels a single tenant's worker and waits (up to `SHUTDOWN_GRACE`)
    /// for it to drain, disconnect its Platform client, and exit on its
    /// own; aborts it outright if it doesn't. A no-op if it isn't running.
    pub async fn stop_tenant(&mut self, tenant_id: i64) {
        if let Some((handle, cancel)) = self.handles.remove(&tenant_id) {
            Self::stop_worker(tenant_id, handle, cancel).await;
        }
    }

    /// Cancels and awaits every running worker concurrently.
    pub async fn stop_all(&mut self) {
        let stops = self
            .handles
            .drain()
            .map(|(tenant_id, (handle, cancel))| Self::stop_worker(tenant_id, handle, cancel));
        futures::future::join_all(stops).await;
    }

    async fn stop_worker(tenant_id: i64, mut handle: JoinHandle<()>, cancel: CancellationToken) {
        cancel.cancel();
        tokio::select! {
            result = &mut handle => {
                if let Err(e) = result {
                    warn!(tenant_id, "worker task panicked during shutdown: {e}");
                }
                info!(tenant_id, "worker stopped");
            }
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
                warn!(tenant_id, "worker did not stop cooperatively within {SHUTDOWN_GRACE:?}, aborting");
                handle.abort();
            }
        }
    }

    /// Snapshots which tenants currently have a live task handle. A
    /// finished-but-unreaped task (crashed worker) still reports `Running`
    /// until the caller notices via `reap` — status here only reflects
    /// whether a stop was ever requested.
    pub fn status(&self) -> HashMap<i64, WorkerStatus> {
        self.handles.keys().map(|&id| (id, WorkerStatus::Running)).collect()
    }

    /// Drops handles for tasks that have already finished (panicked or
    /// returned), so `status()` doesn't keep reporting a dead worker as
    /// running forever.
    pub fn reap_finished(&mut self) {
        self.handles.retain(|_, (handle, _)| !handle.is_finished());
    }
}

fn implicit_tenant() -> Tenant {
    Tenant {
        id: 0,
        api_id: None,
        api_hash: None,
        phone: String::new(),
        session_name: "default".to_string(),
        is_active: true,
        created_at: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockSession;

    struct MockFactory;
    impl SessionFactory for MockFactory {
        fn build(&self, _tenant: &Tenant) -> Box<dyn PlatformSession> {
            Box::new(MockSession::new())
        }
    }

    #[tokio::test]
    async fn start_and_stop_tenant_round_trips() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        let store = Store::from_memory_pool(pool).await.unwrap();
        let config = Config::default();
        let mut pool = SessionPool::new(store, None, &config, Box::new(MockFactory));

        let tenant = implicit_tenant();
        pool.start_tenant(&tenant);
        assert_eq!(pool.status().len(), 1);
        pool.stop_tenant(tenant.id).await;
        assert_eq!(pool.status().len(), 0);
    }
}
