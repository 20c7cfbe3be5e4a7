// src/config/bot.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_i64_opt, env_opt};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl BotConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("BOT_TOKEN") {
            self.token = v;
        }
        if let Some(id) = env_i64_opt("BOT_OWNER_ID") {
            self.owner_id = Some(id);
        }
    }
}
