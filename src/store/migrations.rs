// src/store/migrations.rs
// Ordered (version, description, sql) ledger, applied ascending on every
// connect. "Already exists" is treated as a successful apply so the ledger
// can be bootstrapped from a database that predates it.

use sqlx::SqlitePool;
use tracing::{error, info};

use crate::error::StoreError;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Add alerted_messages table for alert deduplication",
        sql: r#"CREATE TABLE IF NOT EXISTS alerted_messages (
            msg_key    TEXT PRIMARY KEY,
            alerted_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    },
    Migration {
        version: 2,
        description: "Add title to links",
        sql: "ALTER TABLE links ADD COLUMN title TEXT",
    },
    Migration {
        version: 3,
        description: "Add description to links",
        sql: "ALTER TABLE links ADD COLUMN description TEXT",
    },
    Migration {
        version: 4,
        description: "Add image_url to links",
        sql: "ALTER TABLE links ADD COLUMN image_url TEXT",
    },
    Migration {
        version: 5,
        description: "Add settings table for runtime-toggleable options",
        sql: r#"CREATE TABLE IF NOT EXISTS settings (
            key        TEXT PRIMARY KEY,
            value      TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    },
    Migration {
        version: 6,
        description: "Add tenants table for multi-session support",
        sql: r#"CREATE TABLE IF NOT EXISTS tenants (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            api_id       INTEGER,
            api_hash     TEXT,
            phone        TEXT NOT NULL,
            session_name TEXT NOT NULL,
            is_active    INTEGER NOT NULL DEFAULT 1,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        )"#,
    },
];

fn is_already_exists(err: &sqlx::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("already exists") || msg.contains("duplicate")
}

pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(StoreError::Query)?;

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(());
    }

    info!("applying {} pending migrations (current version {current})", pending.len());
    for migration in pending {
        match sqlx::query(migration.sql).execute(pool).await {
            Ok(_) => {
                record_applied(pool, migration).await?;
                info!("v{}: {}", migration.version, migration.description);
            }
            Err(err) if is_already_exists(&err) => {
                record_applied(pool, migration).await?;
                info!("v{}: already applied, skipping", migration.version);
            }
            Err(err) => {
                error!("v{} migration failed: {err}", migration.version);
                return Err(StoreError::Migration {
                    version: migration.version,
                    description: migration.description.to_string(),
                    source: err,
                });
            }
        }
    }
    Ok(())
}

async fn record_applied(pool: &SqlitePool, migration: &Migration) -> Result<(), StoreError> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version, description) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.description)
        .execute(pool)
        .await
        .map_err(StoreError::Query)?;
    Ok(())
}
