// src/store/schema.rs
// Base schema DDL and the FTS5 mirror. Executed statement-by-statement (not
// as one script) so an "already exists" failure on one statement can't
// poison the rest — see `bootstrap` in store::mod.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::StoreError;

/// Each entry is one standalone DDL statement. Keeping them split (rather
/// than one big string split on `;`) avoids accidentally splitting inside a
/// trigger body.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS groups (
        id           INTEGER PRIMARY KEY,
        title        TEXT NOT NULL,
        username     TEXT,
        member_count INTEGER,
        updated_at   TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id           INTEGER NOT NULL,
        group_id     INTEGER NOT NULL,
        sender_id    INTEGER,
        sender_name  TEXT,
        text         TEXT,
        date         TEXT NOT NULL,
        media_type   TEXT,
        forward_from TEXT,
        reply_to_id  INTEGER,
        created_at   TEXT NOT NULL DEFAULT (datetime('now')),
        PRIMARY KEY (id, group_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS links (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        url           TEXT NOT NULL,
        message_id    INTEGER NOT NULL,
        group_id      INTEGER NOT NULL,
        sender_name   TEXT,
        context       TEXT,
        discovered_at TEXT NOT NULL,
        title         TEXT,
        description   TEXT,
        image_url     TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS summaries (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id      INTEGER,
        period_start  TEXT NOT NULL,
        period_end    TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        content       TEXT NOT NULL,
        model         TEXT,
        created_at    TEXT NOT NULL DEFAULT (datetime('now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS summary_jobs (
        id            TEXT PRIMARY KEY,
        group_id      INTEGER,
        hours         INTEGER,
        mode          TEXT,
        status        TEXT,
        progress      INTEGER DEFAULT 0,
        progress_text TEXT,
        result        TEXT,
        error_msg     TEXT,
        created_at    TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS alerted_messages (
        msg_key    TEXT PRIMARY KEY,
        alerted_at TEXT NOT NULL DEFAULT (datetime('now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS settings (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS tenants (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        api_id       INTEGER,
        api_hash     TEXT,
        phone        TEXT NOT NULL,
        session_name TEXT NOT NULL,
        is_active    INTEGER NOT NULL DEFAULT 1,
        created_at   TEXT NOT NULL DEFAULT (datetime('now'))
    )"#,
    r#"CREATE TABLE IF NOT EXISTS schema_version (
        version     INTEGER PRIMARY KEY,
        applied_at  TEXT NOT NULL DEFAULT (datetime('now')),
        description TEXT
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_messages_group_date ON messages(group_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(date)",
    "CREATE INDEX IF NOT EXISTS idx_links_group ON links(group_id, discovered_at)",
    "CREATE INDEX IF NOT EXISTS idx_links_url ON links(url)",
    "CREATE INDEX IF NOT EXISTS idx_summaries_period ON summaries(period_start, period_end)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_unique ON links(url, group_id, message_id)",
];

const FTS_CREATE: &str = r#"CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    text,
    sender_name,
    content='messages',
    content_rowid='rowid'
)"#;

const FTS_TRIGGER_INSERT: &str = r#"CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, text, sender_name)
    VALUES (new.rowid, new.text, new.sender_name);
END"#;

const FTS_TRIGGER_UPDATE: &str = r#"CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages
WHEN new.text IS NOT old.text BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text, sender_name)
    VALUES ('delete', old.rowid, old.text, old.sender_name);
    INSERT INTO messages_fts(rowid, text, sender_name)
    VALUES (new.rowid, new.text, new.sender_name);
END"#;

const FTS_TRIGGER_DELETE: &str = r#"CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, text, sender_name)
    VALUES ('delete', old.rowid, old.text, old.sender_name);
END"#;

fn is_already_exists(err: &sqlx::Error) -> bool {
    err.to_string().to_lowercase().contains("already exists")
}

/// Runs every base DDL statement individually. A UNIQUE-violation on the
/// links dedup index triggers an in-place dedup pass and a single retry
/// rather than failing startup.
pub async fn bootstrap(pool: &SqlitePool) -> Result<(), StoreError> {
    for stmt in SCHEMA_STATEMENTS {
        if let Err(err) = sqlx::query(stmt).execute(pool).await {
            if is_already_exists(&err) {
                continue;
            }
            if stmt.contains("idx_links_unique") {
                warn!("links has pre-existing duplicates, deduplicating before retrying unique index");
                sqlx::query(
                    r#"DELETE FROM links WHERE rowid NOT IN (
                        SELECT MIN(rowid) FROM links GROUP BY url, group_id, message_id
                    )"#,
                )
                .execute(pool)
                .await
                .map_err(StoreError::Query)?;
                sqlx::query(stmt).execute(pool).await.map_err(StoreError::Query)?;
                info!("links deduplicated, unique index established");
                continue;
            }
            return Err(StoreError::Query(err));
        }
    }

    bootstrap_fts(pool).await;
    Ok(())
}

async fn bootstrap_fts(pool: &SqlitePool) {
    for stmt in [FTS_CREATE, FTS_TRIGGER_INSERT, FTS_TRIGGER_UPDATE, FTS_TRIGGER_DELETE] {
        if let Err(err) = sqlx::query(stmt).execute(pool).await {
            if !is_already_exists(&err) {
                warn!("FTS5 setup failed, search falls back to LIKE: {err}");
                return;
            }
        }
    }

    let fts_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts")
        .fetch_one(pool)
        .await
        .unwrap_or(0);
    let msg_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE text IS NOT NULL")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    if fts_count == 0 && msg_count > 0 {
        info!("rebuilding FTS index ({msg_count} messages)");
        if let Err(err) = sqlx::query("INSERT INTO messages_fts(messages_fts) VALUES('rebuild')")
            .execute(pool)
            .await
        {
            warn!("FTS rebuild failed: {err}");
        }
    }
}
