//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::auth::{
    self, LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
};
use crate::web::extract::JsonBody;
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use coursegen_core::domain::{Course, ModuleContent, ModuleDraft, QuizQuestion};
use coursegen_core::orchestrator::ModuleView;
use coursegen_core::pdf::{export_file_name, render_pdf};
use coursegen_core::ports::PortError;
use coursegen_core::prompts::{clean_module_title, content_prompt, parse_titles, titles_prompt};
use coursegen_core::quiz;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        health_handler,
        generate_titles_handler,
        generate_content_handler,
        save_course_handler,
        save_module_content_handler,
        list_courses_handler,
        module_content_handler,
        delete_course_handler,
        module_view_handler,
        module_pdf_handler,
    ),
    components(
        schemas(
            RegisterRequest, RegisterResponse, LoginRequest, LoginResponse, MessageResponse,
            TitlesRequest, TitlesResponse, ContentRequest, ContentResponse,
            SaveCourseRequest, ModuleInput, SaveModuleContentRequest,
            CoursesResponse, CourseSummary, ModuleBody, ModuleViewResponse, QuizQuestionDto
        )
    ),
    tags(
        (name = "Course Generator API", description = "Generate, save and export AI-written course modules.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct TitlesRequest {
    pub prompt: String,
}

#[derive(Serialize, ToSchema)]
pub struct TitlesResponse {
    pub modules: Vec<String>,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct ContentRequest {
    /// The course topic.
    pub prompt: String,
    pub title: String,
}

/// The full generated text: lesson followed by the quiz block.
#[derive(Serialize, ToSchema)]
pub struct ContentResponse {
    pub content: String,
}

/// A module in a save request: either a bare title or a populated module.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ModuleInput {
    Title(String),
    Full {
        title: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        quiz: String,
    },
}

impl ModuleInput {
    fn into_draft(self) -> ModuleDraft {
        match self {
            ModuleInput::Title(title) => ModuleDraft::stub(clean_module_title(&title)),
            ModuleInput::Full {
                title,
                content,
                quiz,
            } => ModuleDraft {
                title: clean_module_title(&title),
                content,
                quiz,
            },
        }
    }
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct SaveCourseRequest {
    pub prompt: String,
    pub modules: Option<Vec<ModuleInput>>,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct SaveModuleContentRequest {
    pub course_prompt: String,
    pub module_title: String,
    pub content: String,
    /// Omit to keep the stored quiz.
    pub quiz: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ModuleBody {
    pub title: String,
    pub content: String,
    pub quiz: String,
}

#[derive(Serialize, ToSchema)]
pub struct CourseSummary {
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    /// Module titles in course order.
    pub modules: Vec<String>,
    pub modules_full: Vec<ModuleBody>,
}

impl From<Course> for CourseSummary {
    fn from(course: Course) -> Self {
        Self {
            prompt: course.prompt,
            created_at: course.created_at,
            modules: course.modules.iter().map(|m| m.title.clone()).collect(),
            modules_full: course
                .modules
                .into_iter()
                .map(|m| ModuleBody {
                    title: m.title,
                    content: m.content,
                    quiz: m.quiz,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CoursesResponse {
    pub courses: Vec<CourseSummary>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ModuleQuery {
    pub course_prompt: Option<String>,
    pub module_title: Option<String>,
}

impl ModuleQuery {
    fn required(&self) -> Result<(&str, String), ApiError> {
        let prompt = self.course_prompt.as_deref().map(str::trim).unwrap_or_default();
        let title = self
            .module_title
            .as_deref()
            .map(clean_module_title)
            .unwrap_or_default();
        if prompt.is_empty() || title.is_empty() {
            return Err(ApiError::Validation("Missing query parameters".to_string()));
        }
        Ok((prompt, title))
    }
}

/// Module view query. `content` and `quiz` carry text the client already holds.
#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ModuleViewQuery {
    pub course_prompt: Option<String>,
    pub module_title: Option<String>,
    pub content: Option<String>,
    pub quiz: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct QuizQuestionDto {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: Option<usize>,
    pub correct_text: Option<String>,
}

impl From<QuizQuestion> for QuizQuestionDto {
    fn from(q: QuizQuestion) -> Self {
        Self {
            question: q.question,
            options: q.options,
            correct_index: q.correct_index,
            correct_text: q.correct_text,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ModuleViewResponse {
    pub title: String,
    pub lesson: String,
    pub quiz_raw: String,
    /// `context`, `store` or `generated`.
    pub source: String,
    /// `structured`, `heuristic`, `unparsed`, or `none` without a quiz.
    pub quiz_kind: String,
    pub questions: Vec<QuizQuestionDto>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Reports whether the store is reachable.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are up"),
        (status = 503, description = "Database unavailable")
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.db.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "connected" })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "database": "unavailable" })),
            )
        }
    }
}

/// Asks the generation backend for the module titles of a course topic.
#[utoipa::path(
    post,
    path = "/generate/titles",
    request_body = TitlesRequest,
    responses(
        (status = 200, description = "Module titles", body = TitlesResponse),
        (status = 400, description = "Prompt missing"),
        (status = 503, description = "All generation keys exhausted")
    )
)]
pub async fn generate_titles_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<TitlesRequest>,
) -> Result<Json<TitlesResponse>, ApiError> {
    let topic = req.prompt.trim();
    if topic.is_empty() {
        return Err(ApiError::Validation("Prompt is required".to_string()));
    }

    let reply = state.dispatcher.dispatch(&[titles_prompt(topic)]).await?;
    let modules = parse_titles(&reply);
    info!("Generated {} module title(s) for '{}'", modules.len(), topic);
    Ok(Json(TitlesResponse { modules }))
}

/// Generates the lesson and quiz text for one module. Nothing is saved.
#[utoipa::path(
    post,
    path = "/generate/content",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Generated lesson and quiz", body = ContentResponse),
        (status = 400, description = "Prompt or title missing"),
        (status = 503, description = "All generation keys exhausted")
    )
)]
pub async fn generate_content_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ContentRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let topic = req.prompt.trim();
    let title = clean_module_title(&req.title);
    if topic.is_empty() || title.is_empty() {
        return Err(ApiError::Validation("Prompt and title required".to_string()));
    }

    let content = state
        .dispatcher
        .dispatch(&[content_prompt(topic, &title)])
        .await?;
    Ok(Json(ContentResponse { content }))
}

/// Saves a course with its modules. Titles alone create stub modules.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = SaveCourseRequest,
    responses(
        (status = 201, description = "Course saved", body = MessageResponse),
        (status = 400, description = "Invalid course data")
    )
)]
pub async fn save_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    JsonBody(req): JsonBody<SaveCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt = req.prompt.trim();
    let modules = match req.modules {
        Some(modules) if !prompt.is_empty() => modules,
        _ => return Err(ApiError::Validation("Invalid course data".to_string())),
    };

    let drafts: Vec<ModuleDraft> = modules.into_iter().map(ModuleInput::into_draft).collect();
    let course = state.db.create_course(user_id, prompt, &drafts).await?;
    info!(
        "Saved course {} with {} module(s) for user {}",
        course.id,
        course.modules.len(),
        user_id
    );
    Ok((StatusCode::CREATED, MessageResponse::new("Course saved")))
}

/// Saves or replaces the content of one module of an existing course.
#[utoipa::path(
    post,
    path = "/courses/modules",
    request_body = SaveModuleContentRequest,
    responses(
        (status = 200, description = "Module content saved", body = MessageResponse),
        (status = 400, description = "Missing required fields"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn save_module_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    JsonBody(req): JsonBody<SaveModuleContentRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let prompt = req.course_prompt.trim();
    let title = clean_module_title(&req.module_title);
    if prompt.is_empty() || title.is_empty() || req.content.trim().is_empty() {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    }

    let course = state
        .db
        .find_course_by_prompt(user_id, prompt)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::NotFound("Course not found".to_string()),
            other => ApiError::Port(other),
        })?;
    state
        .db
        .upsert_module_content(course.id, &title, &req.content, req.quiz.as_deref())
        .await?;
    Ok(MessageResponse::new("Module content saved"))
}

/// Lists the caller's courses, newest first.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "Saved courses", body = CoursesResponse)
    )
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<CoursesResponse>, ApiError> {
    let courses = state.db.list_courses_for_user(user_id).await?;
    Ok(Json(CoursesResponse {
        courses: courses.into_iter().map(CourseSummary::from).collect(),
    }))
}

/// Returns saved module content; stubs count as missing.
#[utoipa::path(
    get,
    path = "/modules/content",
    params(ModuleQuery),
    responses(
        (status = 200, description = "Stored content and quiz", body = ModuleBody),
        (status = 400, description = "Missing query parameters"),
        (status = 404, description = "Module content not found")
    )
)]
pub async fn module_content_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ModuleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (prompt, title) = query.required()?;
    let not_found = || ApiError::NotFound("Module content not found".to_string());

    let course = match state.db.find_course_by_prompt(user_id, prompt).await {
        Ok(course) => course,
        Err(PortError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let module = match state.db.find_module(course.id, &title).await {
        Ok(module) if !module.is_stub() => module,
        Ok(_) | Err(PortError::NotFound(_)) => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    Ok(Json(json!({ "content": module.content, "quiz": module.quiz })))
}

/// Deletes the course at a position of the newest-first listing.
///
/// The index refers to the listing the client last fetched; a course saved
/// or deleted since then shifts it.
#[utoipa::path(
    delete,
    path = "/courses/{index}",
    params(("index" = usize, Path, description = "Position in the newest-first course list")),
    responses(
        (status = 200, description = "Course deleted", body = MessageResponse),
        (status = 400, description = "Invalid index"),
        (status = 404, description = "Course not found")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(index): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let position = index
        .parse::<usize>()
        .map_err(|_| ApiError::Validation("Invalid index".to_string()))?;

    state
        .db
        .delete_course_at(user_id, position)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::NotFound("Course not found".to_string()),
            other => ApiError::Port(other),
        })?;
    info!("Deleted course at position {} for user {}", position, user_id);
    Ok(MessageResponse::new("Course deleted"))
}

/// Resolves a module (client context, store, or fresh generation) with its
/// quiz parsed into questions.
#[utoipa::path(
    get,
    path = "/modules/view",
    params(ModuleViewQuery),
    responses(
        (status = 200, description = "Lesson and parsed quiz", body = ModuleViewResponse),
        (status = 400, description = "Missing course or module"),
        (status = 503, description = "All generation keys exhausted")
    )
)]
pub async fn module_view_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ModuleViewQuery>,
) -> Result<Json<ModuleViewResponse>, ApiError> {
    let context = query.content.as_ref().map(|content| ModuleContent {
        content: content.clone(),
        quiz: query.quiz.clone().unwrap_or_default(),
    });
    let view = state
        .orchestrator
        .load(
            user_id,
            query.course_prompt.as_deref().unwrap_or_default(),
            query.module_title.as_deref().unwrap_or_default(),
            context.as_ref(),
        )
        .await;

    let ready = match view {
        ModuleView::Ready(ready) => ready,
        ModuleView::Error(e) => return Err(e.into()),
        ModuleView::Idle | ModuleView::Loading => {
            return Err(ApiError::Internal("Module view did not settle".to_string()))
        }
    };

    let (quiz_kind, questions) = if ready.quiz_raw.trim().is_empty() {
        ("none", Vec::new())
    } else {
        let parsed = quiz::parse(&ready.quiz_raw);
        (parsed.kind(), parsed.into_questions())
    };

    Ok(Json(ModuleViewResponse {
        title: ready.title,
        lesson: ready.lesson,
        quiz_raw: ready.quiz_raw,
        source: ready.source.as_str().to_string(),
        quiz_kind: quiz_kind.to_string(),
        questions: questions.into_iter().map(QuizQuestionDto::from).collect(),
    }))
}

/// Exports a module as a PDF attachment, generating it first if needed.
#[utoipa::path(
    get,
    path = "/modules/pdf",
    params(ModuleQuery),
    responses(
        (status = 200, description = "PDF document (application/pdf attachment)"),
        (status = 400, description = "Missing query parameters"),
        (status = 503, description = "All generation keys exhausted")
    )
)]
pub async fn module_pdf_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<ModuleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (prompt, title) = query.required()?;

    let ready = match state.orchestrator.load(user_id, prompt, &title, None).await {
        ModuleView::Ready(ready) => ready,
        ModuleView::Error(e) => return Err(e.into()),
        ModuleView::Idle | ModuleView::Loading => {
            return Err(ApiError::Internal("Module view did not settle".to_string()))
        }
    };

    let pdf = render_pdf(&ready.title, &ready.lesson, &ready.quiz_raw)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(&ready.title)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Bytes::from(pdf),
    ))
}
