// src/error.rs
// Domain error types. Library boundaries return these; the orchestration
// layer (bootstrap, bin) widens them to anyhow::Error with .context(...).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("migration {version} ({description}) failed: {source}")]
    Migration {
        version: i64,
        description: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("query failed: {0}")]
    Query(sqlx::Error),
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("group {0} could not be resolved")]
    UnresolvedGroup(String),

    #[error("rate limited, must wait {wait_secs}s")]
    RateLimited { wait_secs: u64 },

    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("no credential slots configured")]
    NoCredentials,
}
