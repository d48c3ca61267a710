//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, InMemoryDb, OpenAiCompatGenerationAdapter},
    config::Config,
    error::ApiError,
    web::{rest::ApiDoc, router, state::AppState},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use coursegen_core::dispatcher::KeyRotationDispatcher;
use coursegen_core::ports::{DatabaseService, TextGenerationService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Store ---
    let db: Arc<dyn DatabaseService> = if config.uses_memory_store() {
        warn!("Using the in-memory store; data is lost on restart.");
        Arc::new(InMemoryDb::new())
    } else {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool);
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
        Arc::new(db_adapter)
    };

    // --- 3. Initialize Generation Backends, One Per Key ---
    let backends: Vec<Arc<dyn TextGenerationService>> = config
        .gemini_api_keys
        .iter()
        .map(|key| {
            Arc::new(OpenAiCompatGenerationAdapter::for_key(
                key,
                &config.generation_api_base,
                &config.generation_model,
            )) as Arc<dyn TextGenerationService>
        })
        .collect();
    let dispatcher = Arc::new(KeyRotationDispatcher::new(backends));
    match dispatcher.credential_count() {
        0 => warn!("No GEMINI_API_KEYS configured; generation requests will fail."),
        count => info!("Loaded {} generation key(s)", count),
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db, config.clone(), dispatcher));

    let origin = config.client_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CLIENT_ORIGIN '{}': {}", config.client_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
