// src/llm/mod.rs
// The LLM protocol client: an OpenAI-compatible chat-completions caller
// sitting on top of the credential slot pool, plus the prompt templates
// and output scrubber the Summarizer composes around it.

pub mod pool;
pub mod prompts;
pub mod scrub;

pub use pool::CredentialPool;
pub use scrub::scrub;

use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SummarizerError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(8);
/// `max_retries = 2`, so 3 total attempts per call.
const MAX_RETRIES: u32 = 2;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

enum CallError {
    /// HTTP 4xx other than 429: fail immediately with the server's message.
    FailFast(String),
    /// 429, 5xx, or transport error: release the slot, back off, retry.
    Retryable(String),
}

/// A protocol client for one `ai.api_url` endpoint, backed by a shared
/// [`CredentialPool`]. Cheap to clone — the pool and `reqwest::Client` are
/// both internally `Arc`-backed.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    pool: std::sync::Arc<CredentialPool>,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl Client {
    pub fn new(api_url: String, model: String, max_tokens: u32, pool: std::sync::Arc<CredentialPool>) -> Self {
        Self {
            http: HttpClient::new(),
            pool,
            api_url,
            model,
            max_tokens,
        }
    }

    /// Issues one chat-completion call, retrying across the credential
    /// pool up to `MAX_RETRIES` times. Every exit path — success, retry,
    /// or final failure — returns its slot via `Slot`'s `Drop` before this
    /// function returns or sleeps.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, SummarizerError> {
        let mut attempt = 0u32;
        loop {
            let slot = self.pool.acquire().await;
            let key = slot.key().to_string();
            let outcome = self.send_once(&key, system, user).await;
            drop(slot);

            match outcome {
                Ok(content) => return Ok(content),
                Err(CallError::FailFast(msg)) => return Err(SummarizerError::Llm(msg)),
                Err(CallError::Retryable(msg)) => {
                    if attempt >= MAX_RETRIES {
                        return Err(SummarizerError::Llm(msg));
                    }
                    let backoff = Duration::from_secs(2u64.pow(attempt));
                    warn!("LLM call failed (attempt {}): {msg}; retrying in {:?}", attempt + 1, backoff);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(&self, key: &str, system: &str, user: &str) -> Result<String, CallError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
            temperature: 0.3,
        };

        let mut req = self.http.post(&self.api_url).json(&body).timeout(REQUEST_TIMEOUT);
        if !key.is_empty() {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("transport error: {e}")))?;
        let status = response.status();

        if status.is_success() {
            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| CallError::Retryable(format!("invalid response body: {e}")))?;
            return parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| CallError::Retryable("empty choices array in LLM response".to_string()));
        }

        let body_text = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(CallError::Retryable(format!("HTTP {status}: {body_text}")))
        } else {
            Err(CallError::FailFast(format!("HTTP {status}: {body_text}")))
        }
    }

    /// `GET <base_url>/v1/models` — 200 means reachable. `base_url` is the
    /// LLM API host with no path suffix (derived by the caller from
    /// `ai.api_url`).
    pub async fn health_probe(&self, base_url: &str, key: &str) -> bool {
        let mut req = self
            .http
            .get(format!("{}/v1/models", base_url.trim_end_matches('/')))
            .timeout(HEALTH_TIMEOUT);
        if !key.is_empty() {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        matches!(req.send().await, Ok(resp) if resp.status().is_success())
    }
}
