//! API routes module

pub mod models;
pub mod relay;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Completion relay routes
        .nest("/relay", relay::router())
        // Model registry routes
        .nest("/models", models::router())
}
