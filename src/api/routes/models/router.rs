//! Router for the model registry API

use axum::{Router, extract::State, routing::get};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::SharedState;

/// List the models the relay can serve
async fn models_list(
    State(state): State<SharedState>,
) -> Result<axum::Json<public::ModelsResponse>, ApiError> {
    let mut models: Vec<public::ModelInfo> = state
        .registry
        .iter()
        .map(|m| public::ModelInfo {
            id: m.id.clone(),
            name: m.name.clone(),
            token_limit: m.token_limit,
            max_output_tokens: m.max_output_tokens,
            default: m.default,
        })
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(axum::Json(public::ModelsResponse { models }))
}

/// Create the models router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(models_list))
}
