// src/llm/scrub.rs
// Normalizes LLM output into plain text that renders cleanly on surfaces
// with no Markdown renderer (bots, CLIs). Idempotent: scrub(scrub(x)) ==
// scrub(x) for any input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HEADING: Regex = Regex::new(r"(?m)^#{1,6}\s*").unwrap();
    static ref BOLD_ITALIC: Regex = Regex::new(r"\*{1,3}|_{1,3}").unwrap();
    static ref BULLET: Regex = Regex::new(r"(?m)^(\s*)[*\-+]\s+").unwrap();
    static ref INLINE_CODE: Regex = Regex::new(r"`").unwrap();
    static ref STRAY_MARKER: Regex = Regex::new(r"(?m)^\s*[*#]\s*$").unwrap();
    static ref BLANK_RUN: Regex = Regex::new(r"\n{3,}").unwrap();
}

/// Strips Markdown heading/emphasis/code syntax, converts list bullets to
/// `"• "`, drops isolated stray marker lines, and collapses long runs of
/// blank lines. Applied to every LLM output before persisting or
/// displaying it.
pub fn scrub(input: &str) -> String {
    let text = HEADING.replace_all(input, "");
    let text = BULLET.replace_all(&text, "$1• ");
    let text = BOLD_ITALIC.replace_all(&text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = STRAY_MARKER.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_headings_and_emphasis() {
        let out = scrub("# Title\n**bold** and _italic_ text");
        assert!(!out.contains('#'));
        assert!(!out.contains('*'));
        assert!(!out.contains('_'));
    }

    #[test]
    fn converts_bullets() {
        let out = scrub("- first\n* second\n+ third");
        assert_eq!(out, "• first\n• second\n• third");
    }

    #[test]
    fn collapses_blank_runs() {
        let out = scrub("a\n\n\n\n\nb");
        assert_eq!(out, "a\n\nb");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "# Heading\n\n**bold** _em_ `code`\n\n\n\n- item\n* item2\n+ item3\n# \n*\n",
            "plain text, nothing to scrub",
            "",
            "###### deep heading\n___underline-ish___",
        ];
        for input in inputs {
            let once = scrub(input);
            let twice = scrub(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }
}
