//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use coursegen_core::dispatcher::KeyRotationDispatcher;
use coursegen_core::orchestrator::ContentOrchestrator;
use coursegen_core::ports::DatabaseService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub dispatcher: Arc<KeyRotationDispatcher>,
    pub orchestrator: Arc<ContentOrchestrator>,
}

impl AppState {
    /// Wires the orchestrator to the same store and dispatcher the handlers use.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        dispatcher: Arc<KeyRotationDispatcher>,
    ) -> Self {
        let orchestrator = Arc::new(ContentOrchestrator::new(db.clone(), dispatcher.clone()));
        Self {
            db,
            config,
            dispatcher,
            orchestrator,
        }
    }
}
