// src/config/telegram.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_i64_opt, env_opt};

fn default_session_name() -> String {
    "tg_monitor".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub api_id: i64,
    #[serde(default)]
    pub api_hash: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_session_name")]
    pub session_name: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_id: 0,
            api_hash: String::new(),
            phone: None,
            session_name: default_session_name(),
        }
    }
}

impl TelegramConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Some(id) = env_i64_opt("TG_API_ID") {
            self.api_id = id;
        }
        if let Some(v) = env_opt("TG_API_HASH") {
            self.api_hash = v;
        }
        if let Some(v) = env_opt("TG_PHONE") {
            self.phone = Some(v);
        }
    }
}

/// A configured monitoring target: either a numeric chat id or a handle.
/// Resolved to a canonical id by the platform client at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupTarget {
    pub id: Option<i64>,
    pub username: Option<String>,
}

impl GroupTarget {
    /// The identifier to hand to the platform resolver: prefers the numeric id.
    pub fn identifier(&self) -> Option<String> {
        self.id
            .map(|id| id.to_string())
            .or_else(|| self.username.clone())
    }
}
