// src/bootstrap.rs
// Wires Config -> Store -> Alert Engine -> Session Pool -> background
// sweepers into one running application. The orchestration layer: library
// errors are widened to `anyhow::Error` with `.context(...)` here, per the
// crate's error-handling convention (see src/error.rs).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::alerts::AlertEngine;
use crate::config::Config;
use crate::error::PlatformError;
use crate::notify::BotNotifier;
use crate::platform::PlatformSession;
use crate::session_pool::{SessionFactory, SessionPool};
use crate::store::{Store, Tenant};

/// A `PlatformSession` that fails immediately on `connect`. Used when no
/// real MTProto/bot client has been wired into the binary — this crate
/// depends on that client only through the `PlatformSession` trait and
/// ships no concrete implementation of its own (see `src/platform/mod.rs`).
struct UnimplementedSession;

#[async_trait]
impl PlatformSession for UnimplementedSession {
    async fn connect(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Auth(
            "no PlatformSession implementation is configured; link a real Platform client against the PlatformSession trait".to_string(),
        ))
    }
    async fn authenticate(&mut self) -> Result<(), PlatformError> {
        Err(PlatformError::Auth("unimplemented".to_string()))
    }
    async fn is_authorized(&self) -> Result<bool, PlatformError> {
        Ok(false)
    }
    async fn resolve_group(&mut self, identifier: &str) -> Result<crate::platform::ResolvedGroup, PlatformError> {
        Err(PlatformError::UnresolvedGroup(identifier.to_string()))
    }
    async fn iter_history(
        &mut self,
        _group_id: i64,
        _before: chrono::DateTime<chrono::Utc>,
        _stop_at: Option<chrono::DateTime<chrono::Utc>>,
        _limit: Option<usize>,
    ) -> Result<Vec<crate::platform::RawMessage>, PlatformError> {
        Ok(Vec::new())
    }
    async fn next_event(&mut self) -> Result<Option<crate::platform::PlatformEvent>, PlatformError> {
        Ok(None)
    }
    async fn disconnect(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }
}

struct UnimplementedSessionFactory;

impl SessionFactory for UnimplementedSessionFactory {
    fn build(&self, _tenant: &Tenant) -> Box<dyn PlatformSession> {
        Box::new(UnimplementedSession)
    }
}

/// The fully wired, running application: a `Store` handle, a `SessionPool`
/// driving every tenant's Ingestion Worker, and the `AlertEngine`/`BotNotifier`
/// they share.
pub struct App {
    pub store: Store,
    pub session_pool: SessionPool,
    pub alerts: Option<Arc<AlertEngine>>,
}

impl App {
    /// Opens the Store, builds the Alert Engine (if keywords are configured),
    /// and constructs (but does not yet start) the Session Pool.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for err in &errors {
                warn!("config problem: {err}");
            }
        }

        let db_path = Path::new(&config.database.path);
        let store = Store::connect(db_path)
            .await
            .with_context(|| format!("failed to open store at {}", db_path.display()))?;

        let alerts = if config.alerts.keywords.is_empty() {
            None
        } else {
            let notifier = BotNotifier::new(config.bot.token.clone());
            let engine = Arc::new(AlertEngine::new(
                store.clone(),
                notifier,
                config.bot.owner_id,
                config.alerts.keywords.clone(),
                config.alerts.enabled,
            ));
            engine.rehydrate().await.context("failed to rehydrate alert dedup state")?;
            Some(engine)
        };

        let session_pool = SessionPool::new(store.clone(), alerts.clone(), config, Box::new(UnimplementedSessionFactory));

        Ok(Self { store, session_pool, alerts })
    }

    /// Starts every configured tenant's Ingestion Worker and blocks until
    /// ctrl-c.
    pub async fn run(mut self) -> Result<()> {
        self.session_pool.start_all().await.context("failed to start ingestion workers")?;
        info!("tg-monitor running; press ctrl-c to stop");
        tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
        info!("shutdown requested");
        self.session_pool.stop_all().await;
        self.store.close().await;
        Ok(())
    }
}
