// src/store/mod.rs
// The embedded SQLite store: connection policy, schema bootstrap,
// migrations, and a thin facade delegating to focused operation modules.

pub mod alerted_keys;
pub mod analytics;
pub mod groups;
pub mod jobs;
pub mod links;
pub mod messages;
pub mod migrations;
pub mod schema;
pub mod settings;
pub mod tenants;
pub mod types;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::StoreError;

use alerted_keys::AlertedKeyOperations;
use analytics::AnalyticsOperations;
use groups::GroupOperations;
use jobs::JobOperations;
use links::LinkOperations;
use messages::MessageOperations;
use settings::SettingsOperations;
use tenants::TenantOperations;

pub use messages::URL_PATTERN;
pub use types::*;

/// The embedded persistence layer. Cheap to clone (an `Arc`-backed pool
/// underneath `sqlx::SqlitePool`); shared by every Ingestion Worker and the
/// Summarizer.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,

    groups: GroupOperations,
    messages: MessageOperations,
    links: LinkOperations,
    analytics: AnalyticsOperations,
    settings: SettingsOperations,
    alerted_keys: AlertedKeyOperations,
    tenants: TenantOperations,
    jobs: JobOperations,
}

impl Store {
    /// Opens `db_path`, applies the connection-policy PRAGMAs, bootstraps
    /// the base schema plus FTS mirror, and runs any pending migrations.
    pub async fn connect(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(StoreError::Connection)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(60))
            .pragma("cache_size", "-32000")
            .pragma("temp_store", "MEMORY")
            .pragma("wal_autocheckpoint", "1000");

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(StoreError::Connection)?;

        schema::bootstrap(&pool).await?;
        migrations::run(&pool).await?;

        info!("database connected (WAL mode): {}", db_path.display());
        Ok(Self::from_pool(pool))
    }

    /// Builds a Store over an already-open pool (e.g. an in-memory pool in
    /// tests). Bootstraps schema and migrations the same way `connect` does.
    pub async fn from_memory_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        schema::bootstrap(&pool).await?;
        migrations::run(&pool).await?;
        Ok(Self::from_pool(pool))
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            groups: GroupOperations::new(pool.clone()),
            messages: MessageOperations::new(pool.clone()),
            links: LinkOperations::new(pool.clone()),
            analytics: AnalyticsOperations::new(pool.clone()),
            settings: SettingsOperations::new(pool.clone()),
            alerted_keys: AlertedKeyOperations::new(pool.clone()),
            tenants: TenantOperations::new(pool.clone()),
            jobs: JobOperations::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn groups(&self) -> &GroupOperations {
        &self.groups
    }

    pub fn messages(&self) -> &MessageOperations {
        &self.messages
    }

    pub fn links(&self) -> &LinkOperations {
        &self.links
    }

    pub fn analytics(&self) -> &AnalyticsOperations {
        &self.analytics
    }

    pub fn settings(&self) -> &SettingsOperations {
        &self.settings
    }

    pub fn alerted_keys(&self) -> &AlertedKeyOperations {
        &self.alerted_keys
    }

    pub fn tenants(&self) -> &TenantOperations {
        &self.tenants
    }

    pub fn jobs(&self) -> &JobOperations {
        &self.jobs
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
