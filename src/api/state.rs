use std::sync::Arc;

use crate::core::AppConfig;
use crate::core::models::ModelRegistry;

/// Per-process state shared across requests. Everything in here is read-only
/// after startup (the registry is never mutated, the client is internally
/// pooled), so it is shared as a plain `Arc` with no lock.
pub struct AppState {
    pub config: AppConfig,
    pub registry: ModelRegistry,
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let registry = ModelRegistry::builtin(&config.fallback_model);
        Self {
            config,
            registry,
            http: reqwest::Client::new(),
        }
    }
}
