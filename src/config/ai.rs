// src/config/ai.rs

use serde::{Deserialize, Serialize};

use super::helpers::{env_numbered, env_opt};

fn default_api_url() -> String {
    "http://localhost:18789/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_per_key_concurrency() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_per_key_concurrency")]
    pub max_concurrent_per_key: usize,
    #[serde(default)]
    pub summary_system_prompt: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key: String::new(),
            api_keys: Vec::new(),
            max_concurrent_per_key: default_per_key_concurrency(),
            summary_system_prompt: String::new(),
        }
    }
}

impl AiConfig {
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("AI_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = env_opt("AI_API_URL") {
            self.api_url = v;
        }
        // Any numbered AI_API_KEY_1..5 present switches to list mode entirely,
        // overriding whatever api_keys the file carried.
        let numbered = env_numbered("AI_API_KEY", 5);
        if !numbered.is_empty() {
            self.api_keys = numbered;
        }
    }

    /// Deduplicated, non-empty credential list. Falls back to a single empty
    /// slot (no Authorization header) when nothing is configured, matching a
    /// local unauthenticated proxy setup.
    pub fn effective_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .api_keys
            .iter()
            .filter(|k| !k.is_empty())
            .cloned()
            .collect();
        if keys.is_empty() && !self.api_key.is_empty() {
            keys.push(self.api_key.clone());
        }
        if keys.is_empty() {
            keys.push(String::new());
        }
        keys
    }
}
