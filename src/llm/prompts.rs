// src/llm/prompts.rs
// Prompt templates sent to the LLM verbatim — their exact wording is part
// of the interface contract, not a style choice.

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a chat-room analysis assistant. Output a structured summary. Use plain text only, no Markdown syntax (no # * ** __), use numbered lists and real line breaks for layout.";

pub const MERGE_SYSTEM_PROMPT: &str = "You are an information-merging assistant. Combine multiple analysis results into one structured summary. Use plain text only, no Markdown syntax.";

pub const GROUP_SEPARATOR: &str = "\n\n────────\n\n";

/// Renders the cross-group overview user message over the concatenation of
/// per-group outputs.
pub fn cross_group_overview_prompt(joined_group_summaries: &str) -> String {
    format!(
        r#"Here are the independent analyses of each monitored chat room.
Combine them into one cross-room overview report, in this exact shape:

[Today at a glance]
2-3 sentences summarizing the overall mood and activity across all rooms.

────────
[Per-room activity]
• Room name: what happened (one line), activity level

────────
[Worth a closer look]
• Which room, what time window, what kind of content is worth reviewing

────────
[Risks & cautions]
• Warnings / complaints / anomalies (omit this section if none)

────────
[Suggested actions]
• 2-4 concrete actions to take today

Do not use Markdown syntax (# * ** __); use "•" for list items.

Per-room analyses follow:

{joined_group_summaries}"#
    )
}

/// The extra instruction appended to a chunk's user message, identifying
/// its position in the map-reduce fan-out.
pub fn batch_instruction(batch_index: usize, batch_total: usize) -> String {
    format!("(this is batch {} of {}, extract the key points of this batch)", batch_index, batch_total)
}
