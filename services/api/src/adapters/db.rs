//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegen_core::domain::{dedupe_drafts, Course, Module, ModuleDraft, User, UserCredentials};
use coursegen_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Loads the modules of every listed course, each list in position order.
    async fn modules_for(&self, course_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<Module>>> {
        let records = sqlx::query_as::<_, ModuleRecord>(
            "SELECT id, course_id, title, content, quiz FROM modules
             WHERE course_id = ANY($1) ORDER BY course_id, position ASC",
        )
        .bind(course_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<Module>> = HashMap::new();
        for record in records {
            grouped.entry(record.course_id).or_default().push(record.to_domain());
        }
        Ok(grouped)
    }

    async fn with_modules(&self, records: Vec<CourseRecord>) -> PortResult<Vec<Course>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut modules = self.modules_for(&ids).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                let course_modules = modules.remove(&r.id).unwrap_or_default();
                r.to_domain(course_modules)
            })
            .collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    name: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    user_id: Uuid,
    prompt: String,
    created_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self, modules: Vec<Module>) -> Course {
        Course {
            id: self.id,
            user_id: self.user_id,
            prompt: self.prompt,
            created_at: self.created_at,
            modules,
        }
    }
}

#[derive(FromRow)]
struct ModuleRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    content: String,
    quiz: String,
}
impl ModuleRecord {
    fn to_domain(self) -> Module {
        Module {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            content: self.content,
            quiz: self.quiz,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(
        &self,
        name: Option<&str>,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, name, hashed_password) VALUES ($1, $2, $3, $4)
             RETURNING user_id, email, name",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("User with email {} already exists", email))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Expired rows are only cleared here; validation ignores them.
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_course(
        &self,
        user_id: Uuid,
        prompt: &str,
        modules: &[ModuleDraft],
    ) -> PortResult<Course> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let course = sqlx::query_as::<_, CourseRecord>(
            "INSERT INTO courses (id, user_id, prompt) VALUES ($1, $2, $3)
             RETURNING id, user_id, prompt, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(prompt)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let mut saved = Vec::new();
        for (position, draft) in dedupe_drafts(modules).into_iter().enumerate() {
            let record = sqlx::query_as::<_, ModuleRecord>(
                "INSERT INTO modules (id, course_id, position, title, content, quiz)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING id, course_id, title, content, quiz",
            )
            .bind(Uuid::new_v4())
            .bind(course.id)
            .bind(position as i32)
            .bind(&draft.title)
            .bind(&draft.content)
            .bind(&draft.quiz)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?;
            saved.push(record.to_domain());
        }

        tx.commit().await.map_err(unexpected)?;
        debug!("Created course {} with {} module(s)", course.id, saved.len());
        Ok(course.to_domain(saved))
    }

    async fn find_course_by_prompt(&self, user_id: Uuid, prompt: &str) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, user_id, prompt, created_at FROM courses
             WHERE user_id = $1 AND prompt = $2
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .bind(prompt)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Course not found".to_string()),
            _ => unexpected(e),
        })?;

        let mut courses = self.with_modules(vec![record]).await?;
        courses
            .pop()
            .ok_or_else(|| PortError::NotFound("Course not found".to_string()))
    }

    async fn list_courses_for_user(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, user_id, prompt, created_at FROM courses
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        self.with_modules(records).await
    }

    async fn delete_course_at(&self, user_id: Uuid, position: usize) -> PortResult<()> {
        let course_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM courses WHERE user_id = $1
             ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT 1",
        )
        .bind(user_id)
        .bind(position as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("No course at position {}", position)))?;

        sqlx::query("DELETE FROM courses WHERE id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn find_module(&self, course_id: Uuid, title: &str) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(
            "SELECT id, course_id, title, content, quiz FROM modules
             WHERE course_id = $1 AND title = $2",
        )
        .bind(course_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Module {} not found", title)),
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn upsert_module_content(
        &self,
        course_id: Uuid,
        title: &str,
        content: &str,
        quiz: Option<&str>,
    ) -> PortResult<Module> {
        let record = sqlx::query_as::<_, ModuleRecord>(
            "INSERT INTO modules (id, course_id, position, title, content, quiz)
             VALUES ($1, $2,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM modules WHERE course_id = $2),
                     $3, $4, COALESCE($5, ''))
             ON CONFLICT (course_id, title) DO UPDATE
             SET content = EXCLUDED.content,
                 quiz = COALESCE($5, modules.quiz)
             RETURNING id, course_id, title, content, quiz",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(title)
        .bind(content)
        .bind(quiz)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                PortError::NotFound(format!("Course {} not found", course_id))
            }
            _ => unexpected(e),
        })?;

        Ok(record.to_domain())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
