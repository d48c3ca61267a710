//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

pub const DEFAULT_GENERATION_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// One generation backend is built per key, in this order.
    pub gemini_api_keys: Vec<String>,
    pub generation_model: String,
    pub generation_api_base: String,
    pub auth_session_ttl_hours: i64,
    pub client_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generation Settings ---
        let gemini_api_keys = lookup("GEMINI_API_KEYS")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .map(|raw| split_keys(&raw))
            .unwrap_or_default();
        let generation_model =
            lookup("GENERATION_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string());
        let generation_api_base = lookup("GENERATION_API_BASE")
            .unwrap_or_else(|| DEFAULT_GENERATION_API_BASE.to_string());

        // --- Auth and CORS ---
        let ttl_str = lookup("AUTH_SESSION_TTL_HOURS").unwrap_or_else(|| "2".to_string());
        let auth_session_ttl_hours = ttl_str
            .parse::<i64>()
            .ok()
            .filter(|h| *h > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "AUTH_SESSION_TTL_HOURS".to_string(),
                    format!("'{}' is not a positive number of hours", ttl_str),
                )
            })?;
        let client_origin =
            lookup("CLIENT_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            gemini_api_keys,
            generation_model,
            generation_api_base,
            auth_session_ttl_hours,
            client_origin,
        })
    }

    /// `memory://` selects the in-process store instead of Postgres.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
