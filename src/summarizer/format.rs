// src/summarizer/format.rs
// Renders a message window into the plain-text block the LLM receives,
// group-aware so a cross-group window reads as distinct sections.

use crate::store::Message;

const LONG_BODY_THRESHOLD: usize = 500;
const HEAD_TAIL_LEN: usize = 250;

/// Formats a window of messages, emitting a header separator whenever
/// `group_id` changes from the previous message.
pub fn format_window(messages: &[Message]) -> String {
    let mut out = String::new();
    let mut prev_group: Option<i64> = None;
    for msg in messages {
        if prev_group != Some(msg.group_id) {
            if prev_group.is_some() {
                out.push('\n');
            }
            out.push_str(&format!("── {} ──\n", msg.group_title.as_deref().unwrap_or("unknown group")));
            prev_group = Some(msg.group_id);
        }
        out.push_str(&format_line(msg));
        out.push('\n');
    }
    out
}

fn format_line(msg: &Message) -> String {
    let ts = format_timestamp(&msg.date);
    let sender = msg.sender_name.as_deref().unwrap_or("unknown");
    let body = truncate_long_body(msg.text.as_deref().unwrap_or(""));
    let mut line = format!("[{ts}] {sender}: {body}");
    if let Some(media) = &msg.media_type {
        line.push_str(&format!(" [{media}]"));
    }
    if let Some(fwd) = &msg.forward_from {
        line.push_str(&format!(" [fwd:{fwd}]"));
    }
    if let Some(reply) = msg.reply_to_id {
        line.push_str(&format!(" [reply:{reply}]"));
    }
    line
}

fn format_timestamp(date: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| date.to_string())
}

/// A single body longer than 500 chars is truncated to the first 250 +
/// a marker + the last 250, preserving context at both ends.
pub fn truncate_long_body(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= LONG_BODY_THRESHOLD {
        return text.to_string();
    }
    let head: String = chars[..HEAD_TAIL_LEN].iter().collect();
    let tail: String = chars[chars.len() - HEAD_TAIL_LEN..].iter().collect();
    format!("{head}...[long text truncated]...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(group_id: i64, id: i64, group_title: Option<&str>, text: &str) -> Message {
        Message {
            id,
            group_id,
            sender_id: Some(1),
            sender_name: Some("alice".to_string()),
            text: Some(text.to_string()),
            date: "2024-01-01T00:00:00Z".to_string(),
            media_type: None,
            forward_from: None,
            reply_to_id: None,
            group_title: group_title.map(str::to_string),
        }
    }

    #[test]
    fn header_emitted_on_group_change() {
        let messages = vec![
            msg(1, 1, Some("Room A"), "hi"),
            msg(1, 2, Some("Room A"), "there"),
            msg(2, 3, Some("Room B"), "yo"),
        ];
        let out = format_window(&messages);
        assert_eq!(out.matches("Room A").count(), 1);
        assert_eq!(out.matches("Room B").count(), 1);
    }

    #[test]
    fn long_body_truncated_preserving_ends() {
        let body = format!("{}{}", "a".repeat(300), "b".repeat(300));
        let truncated = truncate_long_body(&body);
        assert!(truncated.starts_with(&"a".repeat(250)));
        assert!(truncated.ends_with(&"b".repeat(250)));
        assert!(truncated.contains("...[long text truncated]..."));
    }

    #[test]
    fn short_body_untouched() {
        assert_eq!(truncate_long_body("short message"), "short message");
    }
}
