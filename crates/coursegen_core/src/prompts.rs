//! crates/coursegen_core/src/prompts.rs
//!
//! Prompt templates sent to the generation backend, and clean-up of the
//! title list it sends back.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// The quiz format the content prompt asks for. The splitter and the quiz
/// parser both key off this shape.
const QUIZ_FORMAT: &str = "Question: ...
Options:
A. ...
B. ...
C. ...
D. ...
Answer: ...";

static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*0-9.]+\s*").expect("valid list marker regex"));
static TITLE_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^#+|Module Titles").expect("valid title noise regex"));
static LEADING_HASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#+\s*").expect("valid heading regex"));

pub fn titles_prompt(topic: &str) -> String {
    format!(
        "Generate a list of module titles for a course on this prompt: \"{topic}\" but don't write any extra things besides the list in the start and in the end"
    )
}

pub fn content_prompt(course_topic: &str, module_title: &str) -> String {
    format!(
        "For the course on \"{course_topic}\" ,Write detailed notes for the module titled \"{module_title}\" Don't give any heading of this topic. Include explanations and examples. At the end, generate 5 multiple-choice quiz questions on that detailed notes, give it heading as \"Quiz Questions:\" and  give 4 options each and  indicate the correct answer in this format:\n\n{QUIZ_FORMAT}"
    )
}

/// Turns a free-form title list reply into clean, unique titles.
///
/// Models rarely return a bare list, so numbering, bullets, emphasis, headings
/// and a "Module Titles" caption are all stripped or dropped.
pub fn parse_titles(reply: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    reply
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = LIST_MARKER.replace(line, "");
            line.replace("**", "").trim().to_string()
        })
        .filter(|line| !line.is_empty() && !TITLE_NOISE.is_match(line))
        .filter(|line| seen.insert(line.clone()))
        .collect()
}

/// Normalizes a module title received from a client (`## **Intro**` → `Intro`).
pub fn clean_module_title(raw: &str) -> String {
    LEADING_HASHES
        .replace(raw.trim(), "")
        .replace("**", "")
        .trim()
        .to_string()
}
