// src/config/server.rs
// Database location and the periodic-task knobs that aren't tied to a
// single domain (retention, scheduled digest push).

use serde::{Deserialize, Serialize};

fn default_db_path() -> String {
    "./data/tg_monitor.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_keep_days() -> i64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_keep_days")]
    pub keep_days: i64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            keep_days: default_keep_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScheduledPushConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub hours: Option<f64>,
}
