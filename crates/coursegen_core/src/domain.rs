//! crates/coursegen_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// One generation session: a topic prompt owned by a user, with its modules
/// in insertion order.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    pub modules: Vec<Module>,
}

/// One lesson unit inside a course, addressed by `(course, title)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: String,
    pub quiz: String,
}

impl Module {
    /// A module is a stub until its lesson body has been generated.
    pub fn is_stub(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A module as submitted when a course is saved. Most callers only know the
/// title at that point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDraft {
    pub title: String,
    pub content: String,
    pub quiz: String,
}

impl ModuleDraft {
    pub fn stub(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Drops drafts whose title repeats an earlier one, keeping the first.
///
/// Titles are lookup keys within a course, so a course can never hold two
/// modules with the same title.
pub fn dedupe_drafts(drafts: &[ModuleDraft]) -> Vec<ModuleDraft> {
    let mut seen = std::collections::HashSet::new();
    drafts
        .iter()
        .filter(|d| !d.title.is_empty() && seen.insert(d.title.clone()))
        .cloned()
        .collect()
}

/// Lesson and quiz text for one module, as held by a caller that already
/// has it (for example a client that just generated it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleContent {
    pub content: String,
    pub quiz: String,
}

/// A single multiple-choice question reconstructed from quiz text. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// `None` means the correct option is unknown, never "the first option".
    pub correct_index: Option<usize>,
    pub correct_text: Option<String>,
}
