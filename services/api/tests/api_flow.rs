mod common;

use std::sync::atomic::Ordering;

use axum::{
    body::to_bytes,
    http::{header, Method, StatusCode},
};
use common::{app, app_with_failing_keys, json_body, login, send};
use serde_json::json;

const COURSE: &str = "Intro to Rust";
const COURSE_Q: &str = "Intro%20to%20Rust";

#[tokio::test]
async fn register_login_generate_and_save_course() {
    let app = app();
    let token = login(&app.router, "ada@example.com").await;

    let resp = send(
        &app.router,
        Method::POST,
        "/generate/titles",
        Some(&token),
        Some(json!({ "prompt": COURSE })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let titles: Vec<String> = body["modules"]
        .as_array()
        .expect("modules array")
        .iter()
        .map(|t| t.as_str().unwrap_or_default().to_string())
        .collect();
    assert!(!titles.is_empty());
    assert!(titles.iter().all(|t| !t.starts_with('#') && !t.contains("Module Titles")));
    assert_eq!(titles[0], "Getting Started");

    let resp = send(
        &app.router,
        Method::POST,
        "/courses",
        Some(&token),
        Some(json!({ "prompt": COURSE, "modules": titles })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(
        &app.router,
        Method::GET,
        &format!("/modules/content?course_prompt={COURSE_Q}&module_title=Getting%20Started"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app.router, Method::GET, "/courses", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let course = &body["courses"][0];
    assert_eq!(course["prompt"], COURSE);
    assert_eq!(course["modules"].as_array().map(Vec::len), Some(titles.len()));
    assert_eq!(course["modules_full"][0]["content"], "");
}

#[tokio::test]
async fn protected_routes_reject_missing_and_invalid_tokens() {
    let app = app();
    let cases = [
        (Method::POST, "/generate/titles"),
        (Method::GET, "/courses"),
        (Method::DELETE, "/courses/0"),
        (Method::GET, "/modules/content?course_prompt=a&module_title=b"),
        (Method::GET, "/modules/pdf?course_prompt=a&module_title=b"),
    ];

    for (method, uri) in cases {
        let resp = send(&app.router, method.clone(), uri, None, Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "expected 401 for {uri}");

        let resp = send(&app.router, method, uri, Some("not-a-session"), Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "expected 403 for {uri}");
    }
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = app();
    let token = login(&app.router, "cookie@example.com").await;

    let req = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/courses")
        .header(header::COOKIE, format!("session={token}"))
        .body(axum::body::Body::empty())
        .expect("request build should succeed");
    let resp = tower::ServiceExt::oneshot(app.router.clone(), req)
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn registration_and_login_errors() {
    let app = app();
    login(&app.router, "dup@example.com").await;

    let resp = send(
        &app.router,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "dup@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = send(
        &app.router,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": "", "password": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &app.router,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "dup@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(resp).await["error"].is_string());

    let resp = send(
        &app.router,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = app();
    let token = login(&app.router, "bye@example.com").await;

    let resp = send(&app.router, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.contains("Max-Age=0"));

    let resp = send(&app.router, Method::GET, "/courses", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn module_view_generates_once_then_reads_the_store() {
    let app = app();
    let token = login(&app.router, "view@example.com").await;
    send(
        &app.router,
        Method::POST,
        "/courses",
        Some(&token),
        Some(json!({ "prompt": COURSE, "modules": ["Ownership"] })),
    )
    .await;

    let uri = format!("/modules/view?course_prompt={COURSE_Q}&module_title=Ownership");
    let resp = send(&app.router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["source"], "generated");
    assert_eq!(body["quiz_kind"], "heuristic");
    assert!(body["lesson"].as_str().unwrap_or_default().starts_with("Ownership means"));
    assert_eq!(body["questions"][0]["options"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["questions"][0]["correct_index"], 1);
    assert_eq!(app.generation_calls.load(Ordering::SeqCst), 1);

    let resp = send(
        &app.router,
        Method::GET,
        &format!("/modules/content?course_prompt={COURSE_Q}&module_title=Ownership"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["quiz"].as_str().unwrap_or_default().starts_with("Quiz Questions:"));

    let resp = send(&app.router, Method::GET, &uri, Some(&token), None).await;
    let body = json_body(resp).await;
    assert_eq!(body["source"], "store");
    assert_eq!(app.generation_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn module_view_uses_client_context_and_requires_a_course() {
    let app = app();
    let token = login(&app.router, "ctx@example.com").await;

    let resp = send(
        &app.router,
        Method::GET,
        "/modules/view?course_prompt=Any&module_title=Intro&content=Given%20lesson",
        Some(&token),
        None,
    )
    .await;
    let body = json_body(resp).await;
    assert_eq!(body["source"], "context");
    assert_eq!(body["lesson"], "Given lesson");
    assert_eq!(body["quiz_kind"], "none");

    let resp = send(
        &app.router,
        Method::GET,
        "/modules/view?module_title=Intro",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.generation_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn save_module_content_updates_in_place() {
    let app = app();
    let token = login(&app.router, "save@example.com").await;
    send(
        &app.router,
        Method::POST,
        "/courses",
        Some(&token),
        Some(json!({ "prompt": COURSE, "modules": ["Intro", { "title": "Traits", "content": "T" }] })),
    )
    .await;

    for content in ["first", "second"] {
        let resp = send(
            &app.router,
            Method::POST,
            "/courses/modules",
            Some(&token),
            Some(json!({
                "course_prompt": COURSE,
                "module_title": "Intro",
                "content": content,
                "quiz": "Question: q?"
            })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let body = json_body(send(&app.router, Method::GET, "/courses", Some(&token), None).await).await;
    let modules = &body["courses"][0]["modules_full"];
    assert_eq!(modules.as_array().map(Vec::len), Some(2));
    assert_eq!(modules[0]["content"], "second");
    assert_eq!(modules[1]["content"], "T");

    let resp = send(
        &app.router,
        Method::POST,
        "/courses/modules",
        Some(&token),
        Some(json!({ "course_prompt": "Unknown", "module_title": "Intro", "content": "x" })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_course_by_position() {
    let app = app();
    let token = login(&app.router, "del@example.com").await;
    for prompt in ["older", "newer"] {
        send(
            &app.router,
            Method::POST,
            "/courses",
            Some(&token),
            Some(json!({ "prompt": prompt, "modules": [] })),
        )
        .await;
    }

    let resp = send(&app.router, Method::DELETE, "/courses/0", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(send(&app.router, Method::GET, "/courses", Some(&token), None).await).await;
    assert_eq!(body["courses"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["courses"][0]["prompt"], "older");

    let resp = send(&app.router, Method::DELETE, "/courses/5", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&app.router, Method::DELETE, "/courses/abc", Some(&token), None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pdf_export_is_an_attachment() {
    let app = app();
    let token = login(&app.router, "pdf@example.com").await;

    let resp = send(
        &app.router,
        Method::GET,
        "/modules/pdf?course_prompt=Rust&module_title=Ownership%20%26%20Borrowing",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Ownership  Borrowing.pdf\""
    );
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.expect("pdf body");
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn exhausted_keys_answer_service_unavailable() {
    let app = app_with_failing_keys(2);
    let token = login(&app.router, "busy@example.com").await;

    let resp = send(
        &app.router,
        Method::POST,
        "/generate/titles",
        Some(&token),
        Some(json!({ "prompt": COURSE })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("exhausted"));

    let resp = send(
        &app.router,
        Method::GET,
        "/modules/view?course_prompt=Rust&module_title=Intro",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_generation() {
    let app = app();
    let token = login(&app.router, "empty@example.com").await;

    let resp = send(
        &app.router,
        Method::POST,
        "/generate/titles",
        Some(&token),
        Some(json!({ "prompt": "   " })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.generation_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn health_reports_the_store() {
    let app = app();
    let resp = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn missing_or_mistyped_fields_are_validation_errors() {
    let app = app();
    let token = login(&app.router, "fields@example.com").await;

    let cases = [
        ("/auth/register", None, json!({}), "Email and password are required"),
        ("/auth/login", None, json!({ "email": "fields@example.com" }), "Email and password are required"),
        ("/generate/titles", Some(token.as_str()), json!({}), "Prompt is required"),
        ("/generate/content", Some(token.as_str()), json!({ "prompt": "Rust" }), "Prompt and title required"),
        ("/courses", Some(token.as_str()), json!({ "prompt": "x" }), "Invalid course data"),
        ("/courses/modules", Some(token.as_str()), json!({}), "Missing required fields"),
    ];
    for (uri, auth, body, message) in cases {
        let resp = send(&app.router, Method::POST, uri, auth, Some(body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json_body(resp).await["error"], message, "{uri}");
    }

    let resp = send(
        &app.router,
        Method::POST,
        "/generate/titles",
        Some(&token),
        Some(json!({ "prompt": 5 })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
    assert_eq!(app.generation_calls.load(Ordering::SeqCst), 0);
}
