//! crates/coursegen_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Course, Module, ModuleDraft, User, UserCredentials};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(
        &self,
        name: Option<&str>,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user, or `Unauthorized` for unknown or expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Course Management ---
    /// Creates the course and every module draft as one unit.
    async fn create_course(
        &self,
        user_id: Uuid,
        prompt: &str,
        modules: &[ModuleDraft],
    ) -> PortResult<Course>;

    /// The newest course of this user with exactly this prompt.
    async fn find_course_by_prompt(&self, user_id: Uuid, prompt: &str) -> PortResult<Course>;

    /// Newest first, modules in insertion order.
    async fn list_courses_for_user(&self, user_id: Uuid) -> PortResult<Vec<Course>>;

    /// Deletes the course at `position` of the newest-first listing.
    ///
    /// The position is only meaningful against the listing the caller saw; a
    /// course created or deleted in between shifts it.
    async fn delete_course_at(&self, user_id: Uuid, position: usize) -> PortResult<()>;

    // --- Module Management ---
    async fn find_module(&self, course_id: Uuid, title: &str) -> PortResult<Module>;

    /// Updates the module in place or appends it to the course. A `None` quiz
    /// leaves the stored quiz untouched.
    async fn upsert_module_content(
        &self,
        course_id: Uuid,
        title: &str,
        content: &str,
        quiz: Option<&str>,
    ) -> PortResult<Module>;

    // --- Health ---
    async fn ping(&self) -> PortResult<()>;
}

/// One generation backend bound to one API credential.
#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends the prompt parts as a single request and returns the raw reply.
    async fn generate(&self, prompt_parts: &[String]) -> PortResult<String>;
}
