//! crates/coursegen_core/src/splitter.rs
//!
//! Separates a generation reply into the lesson body and the quiz block.

use std::sync::LazyLock;

use regex::Regex;

static QUIZ_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(Quiz Questions:|🧠\s*quiz|##\s*quiz)").expect("valid quiz start regex")
});
static RULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:\*{2,}|-{2,}|_{2,})[ \t]*$").expect("valid rule line regex")
});
static LONE_PUNCT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[.#][ \t]*$").expect("valid lone punctuation regex"));
static EMPTY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*\n\s*```").expect("valid empty fence regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResponse {
    pub lesson: String,
    /// Empty when the reply carried no recognizable quiz heading.
    pub quiz_raw: String,
}

pub fn split(raw: &str) -> SplitResponse {
    match QUIZ_START.find(raw) {
        Some(m) => SplitResponse {
            lesson: cleanup_markdown(raw[..m.start()].trim()),
            quiz_raw: raw[m.start()..].trim().to_string(),
        },
        None => SplitResponse {
            lesson: cleanup_markdown(raw.trim()),
            quiz_raw: String::new(),
        },
    }
}

/// Removes horizontal-rule artifacts, lines holding only `.` or `#`, and empty
/// fenced code blocks.
///
/// Removing one artifact can expose another, so the passes repeat until the
/// text stops changing; the result is stable under a second call.
pub fn cleanup_markdown(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = cleanup_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn cleanup_pass(text: &str) -> String {
    let text = RULE_LINE.replace_all(text, "");
    let text = LONE_PUNCT_LINE.replace_all(&text, "");
    let text = EMPTY_FENCE.replace_all(&text, "");
    text.trim().to_string()
}
