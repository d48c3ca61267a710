//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Selected with
//! `DATABASE_URL=memory://` for local runs and used by the router tests.
//! Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coursegen_core::domain::{dedupe_drafts, Course, Module, ModuleDraft, User, UserCredentials};
use coursegen_core::ports::{DatabaseService, PortError, PortResult};
use tokio::sync::RwLock;
use uuid::Uuid;

struct UserRow {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    users: Vec<UserRow>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    /// Insertion order; the newest course is last.
    courses: Vec<Course>,
}

impl Tables {
    /// Courses of one user, newest first.
    fn courses_of(&self, user_id: Uuid) -> impl Iterator<Item = &Course> {
        self.courses.iter().rev().filter(move |c| c.user_id == user_id)
    }
}

#[derive(Default)]
pub struct InMemoryDb {
    tables: RwLock<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(
        &self,
        name: Option<&str>,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|row| row.user.email == email) {
            return Err(PortError::Conflict(format!(
                "User with email {} already exists",
                email
            )));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
        };
        tables.users.push(UserRow {
            user: user.clone(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.read().await;
        tables
            .users
            .iter()
            .find(|row| row.user.email == email)
            .map(|row| UserCredentials {
                user_id: row.user.user_id,
                email: row.user.email.clone(),
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let now = Utc::now();
        let mut tables = self.tables.write().await;
        tables.sessions.retain(|_, (_, expires)| *expires > now);
        tables
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.tables.read().await;
        match tables.sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.write().await.sessions.remove(session_id);
        Ok(())
    }

    async fn create_course(
        &self,
        user_id: Uuid,
        prompt: &str,
        modules: &[ModuleDraft],
    ) -> PortResult<Course> {
        let course_id = Uuid::new_v4();
        let course = Course {
            id: course_id,
            user_id,
            prompt: prompt.to_string(),
            created_at: Utc::now(),
            modules: dedupe_drafts(modules)
                .into_iter()
                .map(|draft| Module {
                    id: Uuid::new_v4(),
                    course_id,
                    title: draft.title,
                    content: draft.content,
                    quiz: draft.quiz,
                })
                .collect(),
        };
        self.tables.write().await.courses.push(course.clone());
        Ok(course)
    }

    async fn find_course_by_prompt(&self, user_id: Uuid, prompt: &str) -> PortResult<Course> {
        let tables = self.tables.read().await;
        let course = tables
            .courses_of(user_id)
            .find(|c| c.prompt == prompt)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Course not found".to_string()));
        course
    }

    async fn list_courses_for_user(&self, user_id: Uuid) -> PortResult<Vec<Course>> {
        let tables = self.tables.read().await;
        let courses = tables.courses_of(user_id).cloned().collect();
        Ok(courses)
    }

    async fn delete_course_at(&self, user_id: Uuid, position: usize) -> PortResult<()> {
        let mut tables = self.tables.write().await;
        let course_id = tables
            .courses_of(user_id)
            .nth(position)
            .map(|c| c.id)
            .ok_or_else(|| PortError::NotFound(format!("No course at position {}", position)))?;
        tables.courses.retain(|c| c.id != course_id);
        Ok(())
    }

    async fn find_module(&self, course_id: Uuid, title: &str) -> PortResult<Module> {
        let tables = self.tables.read().await;
        tables
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .and_then(|c| c.modules.iter().find(|m| m.title == title))
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Module {} not found", title)))
    }

    async fn upsert_module_content(
        &self,
        course_id: Uuid,
        title: &str,
        content: &str,
        quiz: Option<&str>,
    ) -> PortResult<Module> {
        let mut tables = self.tables.write().await;
        let course = tables
            .courses
            .iter_mut()
            .find(|c| c.id == course_id)
            .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;

        let index = match course.modules.iter().position(|m| m.title == title) {
            Some(index) => index,
            None => {
                course.modules.push(Module {
                    id: Uuid::new_v4(),
                    course_id,
                    title: title.to_string(),
                    content: String::new(),
                    quiz: String::new(),
                });
                course.modules.len() - 1
            }
        };
        let module = &mut course.modules[index];
        module.content = content.to_string();
        if let Some(quiz) = quiz {
            module.quiz = quiz.to_string();
        }
        Ok(module.clone())
    }

    async fn ping(&self) -> PortResult<()> {
        Ok(())
    }
}
