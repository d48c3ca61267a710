#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use api_lib::{adapters::InMemoryDb, config::Config, router, AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use coursegen_core::dispatcher::KeyRotationDispatcher;
use coursegen_core::ports::{PortError, PortResult, TextGenerationService};
use serde_json::Value;
use tower::ServiceExt;

pub const TITLES_REPLY: &str = "## Module Titles\n1. **Getting Started**\n2. Ownership and Borrowing\n- Traits\n# Extras\n";

pub const CONTENT_REPLY: &str = "Ownership means every value has one owner.\n\n```rust\nlet s = String::from(\"hi\");\n```\n\nQuiz Questions:\nQuestion 1: Who owns a value?\nOptions:\nA. Nobody\nB. Exactly one binding\nC. Every thread\nD. The heap\nAnswer: B";

/// Answers title prompts with a title list and everything else with a lesson.
pub struct ScriptedBackend {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TextGenerationService for ScriptedBackend {
    async fn generate(&self, prompt_parts: &[String]) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = prompt_parts.join("\n");
        if prompt.contains("list of module titles") {
            Ok(TITLES_REPLY.to_string())
        } else {
            Ok(CONTENT_REPLY.to_string())
        }
    }
}

pub struct FailingBackend;

#[async_trait]
impl TextGenerationService for FailingBackend {
    async fn generate(&self, _prompt_parts: &[String]) -> PortResult<String> {
        Err(PortError::Unexpected("429 quota exceeded".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub generation_calls: Arc<AtomicUsize>,
}

fn test_config() -> Arc<Config> {
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some("memory://".to_string()),
        _ => None,
    })
    .expect("test config should load");
    Arc::new(config)
}

pub fn app() -> TestApp {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend: Arc<dyn TextGenerationService> = Arc::new(ScriptedBackend {
        calls: calls.clone(),
    });
    build(vec![backend], calls)
}

pub fn app_with_failing_keys(count: usize) -> TestApp {
    let backends = (0..count)
        .map(|_| Arc::new(FailingBackend) as Arc<dyn TextGenerationService>)
        .collect();
    build(backends, Arc::new(AtomicUsize::new(0)))
}

fn build(backends: Vec<Arc<dyn TextGenerationService>>, calls: Arc<AtomicUsize>) -> TestApp {
    let dispatcher = Arc::new(KeyRotationDispatcher::new(backends));
    let state = AppState::new(Arc::new(InMemoryDb::new()), test_config(), dispatcher);
    TestApp {
        router: router(Arc::new(state)),
        generation_calls: calls,
    }
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(req.body(body).expect("request build should succeed"))
        .await
        .expect("router should respond")
}

pub async fn json_body(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Registers and logs in a user, returning the session token.
pub async fn login(app: &Router, email: &str) -> String {
    let resp = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(serde_json::json!({ "name": "Test", "email": email, "password": "hunter2" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(serde_json::json!({ "email": email, "password": "hunter2" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    body["token"].as_str().expect("token in login response").to_string()
}
