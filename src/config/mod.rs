// src/config/mod.rs
// Layered configuration: a YAML file provides defaults, environment
// variables override, composed the way a typed domain-config struct is
// built up from smaller pieces.

pub mod ai;
pub mod alerts;
pub mod bot;
pub mod helpers;
pub mod server;
pub mod telegram;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use ai::AiConfig;
pub use alerts::{AlertsConfig, FilteringConfig};
pub use bot::BotConfig;
pub use server::{DatabaseConfig, MonitoringConfig, ScheduledPushConfig};
pub use telegram::{GroupTarget, TelegramConfig};

/// Full layered configuration record. Unknown keys in the source YAML are
/// ignored by `serde`'s default deserialization, keeping older config files
/// forward-compatible.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub groups: Vec<GroupTarget>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub scheduled_push: ScheduledPushConfig,
}

impl Config {
    /// Loads `config_path` (YAML) and layers environment-variable overrides
    /// on top. Relative `database.path` entries are resolved against the
    /// config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("config file not found: {}", config_path.display()))?;
        let mut cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        cfg.telegram.apply_env_overrides();
        cfg.ai.apply_env_overrides();
        cfg.bot.apply_env_overrides();

        if !Path::new(&cfg.database.path).is_absolute() {
            let root = config_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            cfg.database.path = root.join(&cfg.database.path).to_string_lossy().into_owned();
        }

        Ok(cfg)
    }

    /// Validates the parts of the config required to run at all. Returns
    /// every problem found, not just the first (so a misconfigured operator
    /// sees the whole list in one pass).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.telegram.api_id == 0 {
            errors.push(
                "missing telegram.api_id (obtain one at https://my.telegram.org)".to_string(),
            );
        }
        if self.telegram.api_hash.is_empty() {
            errors.push("missing telegram.api_hash".to_string());
        }
        if self.groups.is_empty() {
            errors.push("no monitored groups configured (groups list is empty)".to_string());
        }
        errors
    }
}
