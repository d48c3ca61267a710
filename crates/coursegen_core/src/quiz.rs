//! crates/coursegen_core/src/quiz.rs
//!
//! Reconstructs multiple-choice questions from quiz text produced by the
//! generation backend.
//!
//! The input is whatever the model wrote, so parsing is total: a JSON array is
//! read field by field, anything else goes through line heuristics, and if
//! neither finds a question the raw text itself is returned as a single
//! pseudo-question so there is always something to render.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::QuizQuestion;

static QUIZ_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:#+\s*)?(?:🧠\s*)?quiz(?:\s+questions)?\b[ \t]*[:*]*")
        .expect("valid quiz heading regex")
});
static NUMBERED_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[*#\s]*Question\s*\d+[:.\s]").expect("valid numbered question regex")
});
static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*[.)]\s+").expect("valid numbered line regex"));
static LABELLED_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[*#\s]*Question\s*[:\-]").expect("valid labelled question regex")
});
static ANSWER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\**\s*Answer\s*[:\-]").expect("valid answer line regex"));
static ANSWER_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Answer\s*[:\-]?\s*(.+)").expect("valid answer value regex"));
static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?[A-Za-z][.)\-]\s+").expect("valid option line regex"));
static OPTIONS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^options?\s*:?\s*$").expect("valid options header regex"));
static QUESTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[*#\s]*(?:Question\s*(?:\d+[*:.\-\s]*|[*:.\-]+\s*)|\d+\s*[.)][*\s]+)")
        .expect("valid question prefix regex")
});
static TRAILING_OPTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Options\s*:?\s*$").expect("valid trailing options regex"));
static LETTER_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?([A-Za-z])\)?[.)]?$").expect("valid letter regex"));
static LETTER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?([A-Za-z])\s*[.):\-]\s").expect("valid letter prefix regex"));

/// The outcome of parsing a quiz block. Every variant holds at least one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedQuiz {
    /// Read from a JSON array of question objects.
    Structured(Vec<QuizQuestion>),
    /// Recovered from free text by the block heuristics.
    Heuristic(Vec<QuizQuestion>),
    /// Nothing recognizable; the raw text stands in as a single question.
    Unparsed(QuizQuestion),
}

impl ParsedQuiz {
    pub fn questions(&self) -> &[QuizQuestion] {
        match self {
            ParsedQuiz::Structured(qs) | ParsedQuiz::Heuristic(qs) => qs,
            ParsedQuiz::Unparsed(q) => std::slice::from_ref(q),
        }
    }

    pub fn into_questions(self) -> Vec<QuizQuestion> {
        match self {
            ParsedQuiz::Structured(qs) | ParsedQuiz::Heuristic(qs) => qs,
            ParsedQuiz::Unparsed(q) => vec![q],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ParsedQuiz::Structured(_) => "structured",
            ParsedQuiz::Heuristic(_) => "heuristic",
            ParsedQuiz::Unparsed(_) => "unparsed",
        }
    }
}

/// Parses quiz text. Never fails and never returns an empty question list.
pub fn parse(quiz_raw: &str) -> ParsedQuiz {
    let normalized = quiz_raw.replace("\r\n", "\n").replace('\r', "\n");
    let body = QUIZ_HEADING.replace(&normalized, "");
    let body = body.trim();

    if let Some(questions) = parse_structured(body) {
        return ParsedQuiz::Structured(questions);
    }

    let questions: Vec<QuizQuestion> = split_blocks(body)
        .iter()
        .map(|block| parse_block(block))
        .filter(|q| !q.question.is_empty() || !q.options.is_empty())
        .collect();
    if !questions.is_empty() {
        return ParsedQuiz::Heuristic(questions);
    }

    let question = if quiz_raw.is_empty() { "Quiz" } else { quiz_raw };
    ParsedQuiz::Unparsed(QuizQuestion {
        question: question.to_string(),
        options: Vec::new(),
        correct_index: None,
        correct_text: (!quiz_raw.is_empty()).then(|| quiz_raw.to_string()),
    })
}

//=========================================================================================
// Structured (JSON) Path
//=========================================================================================

fn parse_structured(text: &str) -> Option<Vec<QuizQuestion>> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(text) else {
        return None;
    };

    let questions: Vec<QuizQuestion> = items.iter().filter_map(structured_item).collect();
    (!questions.is_empty()).then_some(questions)
}

fn structured_item(item: &Value) -> Option<QuizQuestion> {
    let obj = item.as_object()?;
    let field = |names: &[&str]| names.iter().find_map(|n| obj.get(*n).filter(|v| !v.is_null()));

    let question = field(&["question", "q", "prompt"])
        .map(value_text)
        .unwrap_or_default();
    let options: Vec<String> = field(&["options", "choices", "answers"])
        .and_then(Value::as_array)
        .map(|opts| opts.iter().map(value_text).collect())
        .unwrap_or_default();

    let (correct_index, correct_text) = match field(&["answer"]) {
        Some(answer) => resolve_answer(value_text(answer).trim(), &options),
        None => (None, None),
    };

    Some(QuizQuestion {
        question: question.trim().to_string(),
        options,
        correct_index,
        correct_text,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//=========================================================================================
// Heuristic Path
//=========================================================================================

/// One way of cutting quiz text into per-question blocks.
struct BlockStrategy {
    name: &'static str,
    applies: fn(&str) -> bool,
    split: fn(&str) -> Vec<String>,
}

/// Evaluated in order; the first strategy that yields more than one block wins.
static BLOCK_STRATEGIES: &[BlockStrategy] = &[
    BlockStrategy {
        name: "numbered question",
        applies: |t| t.lines().any(|l| NUMBERED_QUESTION.is_match(l)),
        split: |t| split_before_lines(t, &NUMBERED_QUESTION),
    },
    BlockStrategy {
        name: "numbered line",
        applies: |t| t.lines().any(|l| NUMBERED_LINE.is_match(l)),
        split: |t| split_before_lines(t, &NUMBERED_LINE),
    },
    BlockStrategy {
        name: "blank line",
        applies: |t| t.lines().any(|l| l.trim().is_empty()),
        split: split_paragraphs,
    },
    BlockStrategy {
        name: "labelled question",
        applies: |t| t.lines().any(|l| LABELLED_QUESTION.is_match(l)),
        split: |t| split_before_lines(t, &LABELLED_QUESTION),
    },
];

fn split_blocks(text: &str) -> Vec<String> {
    for strategy in BLOCK_STRATEGIES {
        if !(strategy.applies)(text) {
            continue;
        }
        let blocks = (strategy.split)(text);
        if blocks.len() > 1 {
            tracing::debug!("Quiz split into {} blocks by {}", blocks.len(), strategy.name);
            return blocks;
        }
    }
    let whole = text.trim();
    if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    }
}

/// Starts a new block at every line matching `marker`.
fn split_before_lines(text: &str, marker: &Regex) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if marker.is_match(line) && !current.is_empty() {
            blocks.push(current.join("\n"));
            current.clear();
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
        .into_iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

fn parse_block(block: &str) -> QuizQuestion {
    let mut raw_lines: Vec<&str> = block.lines().collect();

    let mut answer_text = None;
    if let Some(idx) = raw_lines.iter().position(|l| ANSWER_LINE.is_match(l.trim())) {
        let line = raw_lines.remove(idx);
        answer_text = ANSWER_VALUE.captures(line).map(|c| clean_answer(&c[1]));
    }

    let lines: Vec<&str> = raw_lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    // The first option-looking line wins, even when the question text itself
    // happens to contain one.
    let first_option = lines
        .iter()
        .position(|l| OPTION_LINE.is_match(l))
        .or_else(|| {
            lines
                .iter()
                .position(|l| OPTIONS_HEADER.is_match(l))
                .map(|header| header + 1)
        });

    let (question_lines, option_lines) = match first_option {
        Some(idx) => lines.split_at(idx.min(lines.len())),
        None => (lines.as_slice(), &[][..]),
    };

    let question = question_lines.join("\n");
    let question = QUESTION_PREFIX.replace(&question, "");
    let question = TRAILING_OPTIONS.replace(question.trim(), "");
    let question = question.trim().to_string();

    let options: Vec<String> = option_lines
        .iter()
        .filter(|l| !OPTIONS_HEADER.is_match(l))
        .map(|l| OPTION_LINE.replace(l, "").trim().to_string())
        .filter(|o| !o.is_empty() && !ANSWER_LINE.is_match(o))
        .collect();

    let (correct_index, correct_text) = match answer_text {
        Some(answer) if !answer.is_empty() => resolve_answer(&answer, &options),
        _ => (None, None),
    };

    QuizQuestion {
        question,
        options,
        correct_index,
        correct_text,
    }
}

fn clean_answer(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c == '*' || c.is_whitespace())
        .trim_end_matches(|c: char| matches!(c, '.' | ')' | '*') || c.is_whitespace())
        .trim()
        .to_string()
}

//=========================================================================================
// Answer Resolution
//=========================================================================================

/// Maps an answer to an option index: a bare letter, then a letter-prefixed
/// answer such as `B. 4`, then a case-insensitive substring of an option.
/// Anything else is kept as free text.
fn resolve_answer(answer: &str, options: &[String]) -> (Option<usize>, Option<String>) {
    if answer.is_empty() {
        return (None, None);
    }

    let letter = LETTER_ONLY
        .captures(answer)
        .or_else(|| LETTER_PREFIX.captures(answer))
        .and_then(|c| c[1].chars().next());
    if let Some(letter) = letter {
        let idx = (letter.to_ascii_uppercase() as u8 - b'A') as usize;
        return if idx < options.len() {
            (Some(idx), None)
        } else {
            (None, Some(answer.to_string()))
        };
    }

    let needle = answer.to_lowercase();
    match options.iter().position(|o| o.to_lowercase().contains(&needle)) {
        Some(idx) => (Some(idx), None),
        None => (None, Some(answer.to_string())),
    }
}
