// src/summarizer/chunking.rs
// Map-reduce over an oversized message window: split into fixed-size
// chunks, summarize each concurrently, then merge. Never returns an `Err`
// — failure is represented as a `"❌ "`-prefixed string, per the
// credential pool's sentinel contract.

use futures::future::join_all;

use crate::llm::{prompts, Client};
use crate::store::Message;

use super::format::format_window;

pub const CHUNK_SIZE: usize = 300;

/// Reports one of the ten discrete progress milestones.
pub type ProgressFn<'a> = dyn FnMut(&str, u32, u32) + 'a;

/// Summarizes a single group/window's worth of messages, chunking if it
/// exceeds `CHUNK_SIZE`. `system_prompt` is the configured (or default)
/// per-chunk system prompt.
pub async fn summarize_window(
    client: &Client,
    system_prompt: &str,
    messages: &[Message],
    progress: &mut ProgressFn<'_>,
) -> String {
    if messages.len() <= CHUNK_SIZE {
        progress("summarizing window", 5, 10);
        let formatted = format_window(messages);
        return match client.chat(system_prompt, &formatted).await {
            Ok(text) => text,
            Err(e) => format!("❌ {e}"),
        };
    }

    let chunks: Vec<&[Message]> = messages.chunks(CHUNK_SIZE).collect();
    let total = chunks.len();
    progress("summarizing in chunks", 2, 10);

    let calls = chunks.iter().enumerate().map(|(i, chunk)| {
        let formatted = format_window(chunk);
        let user = format!("{formatted}\n\n{}", prompts::batch_instruction(i + 1, total));
        async move { client.chat(system_prompt, &user).await }
    });
    let results = join_all(calls).await;
    progress("chunk summaries complete", 6, 10);

    // Only the successful partials are carried into the merge — a failed
    // chunk call is dropped, not embedded as an error string.
    let partials: Vec<String> = results.into_iter().filter_map(Result::ok).collect();
    if partials.is_empty() {
        return "❌ all chunk summaries failed".to_string();
    }
    if partials.len() == 1 {
        return partials.into_iter().next().expect("len checked above");
    }

    progress("merging chunk summaries", 8, 10);
    merge_partials(client, &partials).await
}

/// Calls the LLM once more with the dedicated merge prompt over the
/// concatenated partials. On failure, falls back to a `"---"`-joined
/// concatenation — degraded but always usable.
pub async fn merge_partials(client: &Client, partials: &[String]) -> String {
    let joined = partials.join("\n\n---\n\n");
    match client.chat(prompts::MERGE_SYSTEM_PROMPT, &joined).await {
        Ok(merged) => merged,
        Err(_) => partials.join("\n---\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64) -> Message {
        Message {
            id,
            group_id: 1,
            sender_id: Some(1),
            sender_name: Some("alice".to_string()),
            text: Some(format!("message {id}")),
            date: "2024-01-01T00:00:00Z".to_string(),
            media_type: None,
            forward_from: None,
            reply_to_id: None,
            group_title: Some("Room".to_string()),
        }
    }

    #[test]
    fn six_hundred_fifty_messages_make_three_chunks() {
        let messages: Vec<Message> = (0..650).map(msg).collect();
        let chunks: Vec<&[Message]> = messages.chunks(CHUNK_SIZE).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 300);
        assert_eq!(chunks[1].len(), 300);
        assert_eq!(chunks[2].len(), 50);
    }

    #[tokio::test]
    async fn merge_falls_back_to_dashed_join_on_failure() {
        // Point at a port nothing listens on so every call fails fast via
        // transport error, exhausting retries quickly.
        let pool = std::sync::Arc::new(crate::llm::CredentialPool::new(vec![String::new()], 1));
        let client = Client::new("http://127.0.0.1:1".to_string(), "test-model".to_string(), 64, pool);
        let partials = vec!["first".to_string(), "second".to_string()];
        let merged = merge_partials(&client, &partials).await;
        assert_eq!(merged, "first\n---\nsecond");
    }
}
