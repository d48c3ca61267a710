pub mod auth;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;

/// Builds the API router: public auth and health routes, and everything else
/// behind `require_auth`.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/health", get(rest::health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/generate/titles", post(rest::generate_titles_handler))
        .route("/generate/content", post(rest::generate_content_handler))
        .route(
            "/courses",
            post(rest::save_course_handler).get(rest::list_courses_handler),
        )
        .route("/courses/modules", post(rest::save_module_content_handler))
        .route("/courses/{index}", delete(rest::delete_course_handler))
        .route("/modules/content", get(rest::module_content_handler))
        .route("/modules/view", get(rest::module_view_handler))
        .route("/modules/pdf", get(rest::module_pdf_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
