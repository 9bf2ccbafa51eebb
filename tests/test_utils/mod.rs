//! Test utilities for integration tests
use std::sync::Arc;

use axum::Router;
use axum::body::Body;

use crosstalk::api::{AppState, app};
use crosstalk::core::AppConfig;

/// A config wired to a mockito upstream with auth disabled. Individual tests
/// tweak fields before building the app.
pub fn test_config(upstream_url: &str) -> AppConfig {
    AppConfig {
        openai_api_hostname: upstream_url.to_string(),
        openai_api_key: String::from("test-api-key"),
        openai_api_version: None,
        gateway_api_hostname: None,
        google_api_hostname: upstream_url.to_string(),
        google_access_token: String::from("test-access-token"),
        google_project_id: String::from("test-project"),
        google_location: String::from("us-central1"),
        fallback_model: String::from("gpt-3.5-turbo"),
        default_system_prompt: String::from("You are a helpful assistant."),
        default_temperature: 1.0,
        upstream_timeout_secs: 5,
        auth_disabled: true,
    }
}

/// Creates a test application router pointed at the given upstream.
pub fn test_app(config: AppConfig) -> Router {
    app(Arc::new(AppState::new(config)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read response body");
    String::from_utf8(bytes.to_vec()).expect("Response body was not UTF-8")
}
