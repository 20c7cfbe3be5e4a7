// src/notify/mod.rs
// Outbound push to the Platform's bot API. Used by the Alert Engine for
// keyword notifications and by the scheduled-push failure path to notify
// the owner that a digest run failed.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Serialize;
use tracing::warn;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

/// A thin client for `POST https://api.<platform>/bot<TOKEN>/sendMessage`.
/// Non-200 responses and transport errors are logged and swallowed — an
/// outbound notification failure must never propagate into the ingestion
/// or summarization path that triggered it.
#[derive(Clone)]
pub struct BotNotifier {
    http: HttpClient,
    api_base: String,
    token: String,
}

impl BotNotifier {
    pub fn new(token: String) -> Self {
        Self::with_api_base(token, "https://api.telegram.org".to_string())
    }

    pub fn with_api_base(token: String, api_base: String) -> Self {
        Self {
            http: HttpClient::new(),
            api_base,
            token,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.token.is_empty()
    }

    /// Sends `text` to `chat_id`. Returns whether the push succeeded,
    /// purely for metrics/log purposes — callers never treat a `false`
    /// as fatal.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> bool {
        if !self.is_configured() {
            return false;
        }
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        match self.http.post(&url).json(&body).timeout(NOTIFY_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!("bot notification rejected: HTTP {}", resp.status());
                false
            }
            Err(err) => {
                warn!("bot notification failed: {err}");
                false
            }
        }
    }
}
