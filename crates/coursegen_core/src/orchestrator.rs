//! crates/coursegen_core/src/orchestrator.rs
//!
//! Resolves the lesson and quiz for one module of a course. Content comes from
//! the caller, from the store, or is generated and written back.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dispatcher::{DispatchError, KeyRotationDispatcher};
use crate::domain::{Module, ModuleContent};
use crate::ports::DatabaseService;
use crate::prompts::{clean_module_title, content_prompt};
use crate::splitter::{cleanup_markdown, split};

/// Where the content of a ready module came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Supplied by the caller with the request.
    Context,
    /// A stored module with a non-empty lesson.
    Store,
    /// Freshly generated.
    Generate,
}

impl ContentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentSource::Context => "context",
            ContentSource::Store => "store",
            ContentSource::Generate => "generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyModule {
    pub title: String,
    pub lesson: String,
    /// Unparsed quiz block, empty when the module has none.
    pub quiz_raw: String,
    pub source: ContentSource,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    #[error("Course context is missing")]
    MissingCourseContext,
    #[error("Module title is missing")]
    MissingModuleTitle,
    #[error("{0}")]
    GenerationExhausted(String),
    #[error("Failed to generate module content: {0}")]
    GenerationFailed(String),
}

/// Lifecycle of a module view. `load` only ever returns the terminal states;
/// `Idle` and `Loading` exist for callers that track a view across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleView {
    Idle,
    Loading,
    Ready(ReadyModule),
    Error(ViewError),
}

impl ModuleView {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleView::Ready(_) | ModuleView::Error(_))
    }
}

/// The decision table: caller context beats a stored lesson, and anything
/// else is generated.
pub fn decide(context: Option<&ModuleContent>, stored: Option<&Module>) -> ContentSource {
    match (context, stored) {
        (Some(ctx), _) if !ctx.content.trim().is_empty() => ContentSource::Context,
        (_, Some(module)) if !module.is_stub() => ContentSource::Store,
        _ => ContentSource::Generate,
    }
}

/// Lesson and quiz from text that may hold the full reply in `content`.
fn normalize(content: &str, quiz: &str) -> (String, String) {
    if quiz.trim().is_empty() {
        let parts = split(content);
        (parts.lesson, parts.quiz_raw)
    } else {
        (cleanup_markdown(content), quiz.trim().to_string())
    }
}

pub struct ContentOrchestrator {
    db: Arc<dyn DatabaseService>,
    dispatcher: Arc<KeyRotationDispatcher>,
}

impl ContentOrchestrator {
    pub fn new(db: Arc<dyn DatabaseService>, dispatcher: Arc<KeyRotationDispatcher>) -> Self {
        Self { db, dispatcher }
    }

    pub async fn load(
        &self,
        user_id: Uuid,
        course_prompt: &str,
        module_title: &str,
        context: Option<&ModuleContent>,
    ) -> ModuleView {
        let course_prompt = course_prompt.trim();
        if course_prompt.is_empty() {
            return ModuleView::Error(ViewError::MissingCourseContext);
        }
        let title = clean_module_title(module_title);
        if title.is_empty() {
            return ModuleView::Error(ViewError::MissingModuleTitle);
        }

        let stored = match context {
            Some(ctx) if !ctx.content.trim().is_empty() => None,
            _ => self.lookup(user_id, course_prompt, &title).await,
        };

        let source = decide(context, stored.as_ref());
        debug!(course = course_prompt, module = %title, source = source.as_str(), "Resolving module view");

        match (source, context, stored) {
            (ContentSource::Context, Some(ctx), _) => {
                let (lesson, quiz_raw) = normalize(&ctx.content, &ctx.quiz);
                ready(title, lesson, quiz_raw, source)
            }
            (ContentSource::Store, _, Some(module)) => {
                let (lesson, quiz_raw) = normalize(&module.content, &module.quiz);
                ready(title, lesson, quiz_raw, source)
            }
            _ => self.generate(user_id, course_prompt, title).await,
        }
    }

    /// A failed lookup counts as a miss; the module is generated instead.
    async fn lookup(&self, user_id: Uuid, course_prompt: &str, title: &str) -> Option<Module> {
        let course = match self.db.find_course_by_prompt(user_id, course_prompt).await {
            Ok(course) => course,
            Err(e) => {
                debug!("No stored course for prompt '{}': {}", course_prompt, e);
                return None;
            }
        };
        match self.db.find_module(course.id, title).await {
            Ok(module) => Some(module),
            Err(e) => {
                debug!("No stored module '{}': {}", title, e);
                None
            }
        }
    }

    async fn generate(&self, user_id: Uuid, course_prompt: &str, title: String) -> ModuleView {
        let prompt = content_prompt(course_prompt, &title);
        let raw = match self.dispatcher.dispatch(&[prompt]).await {
            Ok(raw) => raw,
            Err(e @ DispatchError::Exhausted { .. }) => {
                return ModuleView::Error(ViewError::GenerationExhausted(e.to_string()));
            }
            Err(e) => {
                warn!("Module generation failed for '{}': {}", title, e);
                return ModuleView::Error(ViewError::GenerationFailed(e.to_string()));
            }
        };

        let parts = split(&raw);
        self.persist(user_id, course_prompt, &title, &parts.lesson, &parts.quiz_raw)
            .await;
        ready(title, parts.lesson, parts.quiz_raw, ContentSource::Generate)
    }

    async fn persist(&self, user_id: Uuid, course_prompt: &str, title: &str, lesson: &str, quiz: &str) {
        let course = match self.db.find_course_by_prompt(user_id, course_prompt).await {
            Ok(course) => course,
            Err(e) => {
                error!("Generated content for '{}' not saved, course lookup failed: {}", title, e);
                return;
            }
        };
        match self
            .db
            .upsert_module_content(course.id, title, lesson, Some(quiz))
            .await
        {
            Ok(_) => info!("Saved generated content for module '{}'", title),
            Err(e) => error!("Failed to save generated content for '{}': {}", title, e),
        }
    }
}

fn ready(title: String, lesson: String, quiz_raw: String, source: ContentSource) -> ModuleView {
    ModuleView::Ready(ReadyModule {
        title,
        lesson,
        quiz_raw,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Course, ModuleDraft, User, UserCredentials};
    use crate::ports::{PortError, PortResult, TextGenerationService};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// One course per test, held in memory.
    #[derive(Default)]
    struct OneCourseDb {
        course: Mutex<Option<Course>>,
        upserts: AtomicUsize,
    }

    impl OneCourseDb {
        fn with_course(prompt: &str, modules: Vec<(&str, &str, &str)>) -> Self {
            let course_id = Uuid::new_v4();
            let modules = modules
                .into_iter()
                .map(|(title, content, quiz)| Module {
                    id: Uuid::new_v4(),
                    course_id,
                    title: title.to_string(),
                    content: content.to_string(),
                    quiz: quiz.to_string(),
                })
                .collect();
            Self {
                course: Mutex::new(Some(Course {
                    id: course_id,
                    user_id: Uuid::nil(),
                    prompt: prompt.to_string(),
                    created_at: Utc::now(),
                    modules,
                })),
                upserts: AtomicUsize::new(0),
            }
        }

        fn stored(&self, title: &str) -> Option<Module> {
            let guard = self.course.lock().unwrap();
            guard
                .as_ref()
                .and_then(|c| c.modules.iter().find(|m| m.title == title).cloned())
        }
    }

    fn unused<T>() -> PortResult<T> {
        Err(PortError::Unexpected("not used in these tests".to_string()))
    }

    #[async_trait]
    impl DatabaseService for OneCourseDb {
        async fn create_user(&self, _: Option<&str>, _: &str, _: &str) -> PortResult<User> {
            unused()
        }
        async fn get_user_by_email(&self, _: &str) -> PortResult<UserCredentials> {
            unused()
        }
        async fn create_auth_session(&self, _: &str, _: Uuid, _: DateTime<Utc>) -> PortResult<()> {
            unused()
        }
        async fn validate_auth_session(&self, _: &str) -> PortResult<Uuid> {
            unused()
        }
        async fn delete_auth_session(&self, _: &str) -> PortResult<()> {
            unused()
        }
        async fn create_course(&self, _: Uuid, _: &str, _: &[ModuleDraft]) -> PortResult<Course> {
            unused()
        }
        async fn find_course_by_prompt(&self, _: Uuid, prompt: &str) -> PortResult<Course> {
            self.course
                .lock()
                .unwrap()
                .clone()
                .filter(|c| c.prompt == prompt)
                .ok_or_else(|| PortError::NotFound("course".to_string()))
        }
        async fn list_courses_for_user(&self, _: Uuid) -> PortResult<Vec<Course>> {
            unused()
        }
        async fn delete_course_at(&self, _: Uuid, _: usize) -> PortResult<()> {
            unused()
        }
        async fn find_module(&self, course_id: Uuid, title: &str) -> PortResult<Module> {
            self.stored(title)
                .filter(|m| m.course_id == course_id)
                .ok_or_else(|| PortError::NotFound("module".to_string()))
        }
        async fn upsert_module_content(
            &self,
            course_id: Uuid,
            title: &str,
            content: &str,
            quiz: Option<&str>,
        ) -> PortResult<Module> {
            self.upserts.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.course.lock().unwrap();
            let course = guard.as_mut().ok_or_else(|| PortError::NotFound("course".to_string()))?;
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
            if let Some(q) = quiz {
                module.quiz = q.to_string();
            }
            Ok(module.clone())
        }
        async fn ping(&self) -> PortResult<()> {
            Ok(())
        }
    }

    struct FixedBackend {
        reply: Option<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextGenerationService for FixedBackend {
        async fn generate(&self, _: &[String]) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| PortError::Unexpected("quota exceeded".to_string()))
        }
    }

    fn orchestrator(db: Arc<OneCourseDb>, reply: Option<&'static str>) -> (ContentOrchestrator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend: Arc<dyn TextGenerationService> = Arc::new(FixedBackend {
            reply,
            calls: calls.clone(),
        });
        let dispatcher = Arc::new(KeyRotationDispatcher::new(vec![backend]));
        (ContentOrchestrator::new(db, dispatcher), calls)
    }

    const REPLY: &str = "Ownership rules.\n***\nQuiz Questions:\nQuestion: Who owns?\nA. x\nB. y\nAnswer: A";

    #[test]
    fn decision_table_prefers_context_then_store() {
        let ctx = ModuleContent {
            content: "given".into(),
            quiz: String::new(),
        };
        let blank_ctx = ModuleContent::default();
        let module = Module {
            id: Uuid::nil(),
            course_id: Uuid::nil(),
            title: "T".into(),
            content: "stored".into(),
            quiz: String::new(),
        };
        let stub = Module {
            content: "  ".into(),
            ..module.clone()
        };

        assert_eq!(decide(Some(&ctx), Some(&module)), ContentSource::Context);
        assert_eq!(decide(Some(&blank_ctx), Some(&module)), ContentSource::Store);
        assert_eq!(decide(None, Some(&stub)), ContentSource::Generate);
        assert_eq!(decide(None, None), ContentSource::Generate);
    }

    #[tokio::test]
    async fn missing_course_prompt_is_an_error() {
        let db = Arc::new(OneCourseDb::default());
        let (orch, calls) = orchestrator(db, Some(REPLY));

        let view = orch.load(Uuid::nil(), "  ", "Ownership", None).await;
        assert_eq!(view, ModuleView::Error(ViewError::MissingCourseContext));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn context_content_skips_store_and_generation() {
        let db = Arc::new(OneCourseDb::with_course("Rust", vec![("Ownership", "stored", "")]));
        let (orch, calls) = orchestrator(db, Some(REPLY));
        let ctx = ModuleContent {
            content: "From the client".into(),
            quiz: "Question: q?".into(),
        };

        let ModuleView::Ready(ready) = orch.load(Uuid::nil(), "Rust", "Ownership", Some(&ctx)).await else {
            panic!("expected a ready view");
        };
        assert_eq!(ready.source, ContentSource::Context);
        assert_eq!(ready.lesson, "From the client");
        assert_eq!(ready.quiz_raw, "Question: q?");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stored_content_is_returned_without_generation() {
        let db = Arc::new(OneCourseDb::with_course(
            "Rust",
            vec![("Ownership", "Stored lesson\nQuiz Questions:\nQuestion: a?", "")],
        ));
        let (orch, calls) = orchestrator(db, Some(REPLY));

        let ModuleView::Ready(ready) = orch.load(Uuid::nil(), "Rust", "## **Ownership**", None).await else {
            panic!("expected a ready view");
        };
        assert_eq!(ready.source, ContentSource::Store);
        assert_eq!(ready.title, "Ownership");
        assert_eq!(ready.lesson, "Stored lesson");
        assert!(ready.quiz_raw.starts_with("Quiz Questions:"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stub_is_generated_and_written_back() {
        let db = Arc::new(OneCourseDb::with_course("Rust", vec![("Ownership", "", "")]));
        let (orch, calls) = orchestrator(db.clone(), Some(REPLY));

        let ModuleView::Ready(ready) = orch.load(Uuid::nil(), "Rust", "Ownership", None).await else {
            panic!("expected a ready view");
        };
        assert_eq!(ready.source, ContentSource::Generate);
        assert_eq!(ready.lesson, "Ownership rules.");
        assert!(ready.quiz_raw.starts_with("Quiz Questions:"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let saved = db.stored("Ownership").expect("module persisted");
        assert_eq!(saved.content, "Ownership rules.");
        assert_eq!(saved.quiz, ready.quiz_raw);

        let ModuleView::Ready(again) = orch.load(Uuid::nil(), "Rust", "Ownership", None).await else {
            panic!("expected a ready view");
        };
        assert_eq!(again.source, ContentSource::Store);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistence_failure_still_yields_content() {
        let db = Arc::new(OneCourseDb::default());
        let (orch, _) = orchestrator(db.clone(), Some(REPLY));

        let view = orch.load(Uuid::nil(), "Unsaved course", "Ownership", None).await;
        assert!(matches!(view, ModuleView::Ready(ReadyModule { source: ContentSource::Generate, .. })));
        assert_eq!(db.upserts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_keys_are_reported_distinctly() {
        let db = Arc::new(OneCourseDb::with_course("Rust", vec![]));
        let (orch, _) = orchestrator(db, None);

        let view = orch.load(Uuid::nil(), "Rust", "Ownership", None).await;
        assert!(matches!(view, ModuleView::Error(ViewError::GenerationExhausted(_))));
        assert!(view.is_terminal());
    }

    #[tokio::test]
    async fn no_keys_is_a_generation_failure() {
        let db: Arc<dyn DatabaseService> = Arc::new(OneCourseDb::default());
        let orch = ContentOrchestrator::new(db, Arc::new(KeyRotationDispatcher::new(vec![])));

        let view = orch.load(Uuid::nil(), "Rust", "Ownership", None).await;
        assert!(matches!(view, ModuleView::Error(ViewError::GenerationFailed(_))));
    }
}
