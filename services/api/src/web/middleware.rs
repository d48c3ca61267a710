//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use coursegen_core::ports::PortError;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ApiError;
use crate::web::state::AppState;

/// Session id from `Authorization: Bearer <id>`, or else from the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|t| !t.is_empty())
}

/// Middleware that validates the session token and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// A missing token is a 401; an unknown or expired one is a 403.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers())
        .ok_or_else(|| ApiError::Unauthenticated("Access denied. No token provided.".to_string()))?;

    let user_id = match state.db.validate_auth_session(token).await {
        Ok(user_id) => user_id,
        Err(PortError::Unauthorized) | Err(PortError::NotFound(_)) => {
            debug!("Rejected invalid or expired session token");
            return Err(ApiError::InvalidCredential("Invalid or expired token".to_string()));
        }
        Err(e) => {
            error!("Failed to validate auth session: {:?}", e);
            return Err(ApiError::Port(e));
        }
    };

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
