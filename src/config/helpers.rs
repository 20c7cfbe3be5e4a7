// src/config/helpers.rs
// Small env-var helpers shared by every domain sub-config.

use std::env;

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// A malformed value is treated the same as unset (ignored rather than
/// failing startup), leaving whatever the file configured.
pub fn env_i64_opt(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Collects `PREFIX_1` .. `PREFIX_5`, skipping unset/empty entries.
pub fn env_numbered(prefix: &str, max: u8) -> Vec<String> {
    (1..=max)
        .filter_map(|i| env_opt(&format!("{prefix}_{i}")))
        .collect()
}
