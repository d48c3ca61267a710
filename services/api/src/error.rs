//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coursegen_core::dispatcher::DispatchError;
use coursegen_core::orchestrator::ViewError;
use coursegen_core::pdf::PdfError;
use coursegen_core::ports::PortError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed; raised before any side effect.
    #[error("{0}")]
    Validation(String),

    /// No session token was presented, or the login itself failed.
    #[error("{0}")]
    Unauthenticated(String),

    /// A token or password was presented but is not valid.
    #[error("{0}")]
    InvalidCredential(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// Every generation key failed for this request.
    #[error("{0}")]
    GenerationExhausted(String),

    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Exhausted { .. } => ApiError::GenerationExhausted(e.to_string()),
            DispatchError::EmptyPrompt => ApiError::Validation(e.to_string()),
            DispatchError::NoCredentials => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ViewError> for ApiError {
    fn from(e: ViewError) -> Self {
        match e {
            ViewError::MissingCourseContext | ViewError::MissingModuleTitle => {
                ApiError::Validation(e.to_string())
            }
            ViewError::GenerationExhausted(msg) => ApiError::GenerationExhausted(msg),
            ViewError::GenerationFailed(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<PdfError> for ApiError {
    fn from(e: PdfError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredential(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::GenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Port(PortError::Unauthorized) => StatusCode::FORBIDDEN,
            ApiError::Port(PortError::Unexpected(_))
            | ApiError::Config(_)
            | ApiError::Database(_)
            | ApiError::Io(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Port(PortError::NotFound(msg)) | ApiError::Port(PortError::Conflict(msg)) => {
                msg.clone()
            }
            _ if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => {
                error!("Request failed: {}", self);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_by_variant() {
        assert_eq!(
            ApiError::from(PortError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PortError::Conflict("x".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(PortError::Unexpected("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn exhausted_generation_is_service_unavailable() {
        let err = ApiError::from(DispatchError::Exhausted {
            attempts: 2,
            source: PortError::Unexpected("quota".into()),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("2 attempt(s)"));
    }

    #[test]
    fn auth_failures_split_missing_from_invalid() {
        assert_eq!(
            ApiError::Unauthenticated("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::InvalidCredential("bad".into()).status(),
            StatusCode::FORBIDDEN
        );
    }
}
