//! Router for the completion relay
//!
//! Takes a conversation, fits it to the resolved model's token budget,
//! translates it to the provider's wire format, and streams the completion
//! back to the caller as raw chunked text with no envelope.
//!
//! The response body pulls the upstream stream directly, so a slow caller
//! back-pressures the upstream read end-to-end and a caller disconnect drops
//! the upstream connection. One caveat: an upstream failure after the 200
//! has been sent can only end the byte stream -- it is indistinguishable
//! from a clean completion on the wire.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Extension, Router,
    body::{Body, Bytes},
    extract::State,
    response::Response,
    routing::post,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use http::{StatusCode, header};

use super::public;
use crate::api::auth::CallerIdentity;
use crate::api::public::ApiError;
use crate::api::state::SharedState;
use crate::core::budget::trim_history;
use crate::provider::{Requester, StreamEvent, build_request, open_stream};

/// Relay one completion turn to the upstream provider.
async fn relay_handler(
    State(state): State<SharedState>,
    Extension(caller): Extension<CallerIdentity>,
    axum::Json(payload): axum::Json<public::RelayRequest>,
) -> Result<Response, ApiError> {
    let model = state.registry.resolve(&payload.model_id);
    let system_prompt = payload
        .system_prompt
        .clone()
        .unwrap_or_else(|| state.config.default_system_prompt.clone());
    let temperature = payload
        .temperature
        .unwrap_or(state.config.default_temperature);

    // Tokenization failure aborts here, before any upstream I/O.
    let trimmed = trim_history(&system_prompt, &payload.messages, model)?;
    if trimmed.messages.is_empty() && !payload.messages.is_empty() {
        // The request still goes out with no conversational context rather
        // than failing loudly.
        tracing::warn!(
            model = %model.id,
            correlation_id = %payload.correlation_id,
            "history trimmed to an empty window"
        );
    }

    tracing::debug!(
        model = %model.id,
        correlation_id = %payload.correlation_id,
        addons = payload.addon_ids.len(),
        tokens = trimmed.token_count,
        window = trimmed.messages.len(),
        "relaying completion"
    );

    let requester = Requester {
        session: caller.session,
        correlation_id: payload.correlation_id,
    };
    let request = build_request(
        &trimmed,
        model,
        temperature,
        &system_prompt,
        &requester,
        &state.config,
    );

    // Errors surfaced here (non-2xx, transport) still become a clean non-200
    // response; nothing has been written to the caller yet.
    let upstream = open_stream(
        &state.http,
        request,
        Duration::from_secs(state.config.upstream_timeout_secs),
    )
    .await
    .map_err(anyhow::Error::from)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(relay_body(upstream)))?;
    Ok(response)
}

/// Forward upstream chunks verbatim until the terminal event. An upstream
/// error after this point can only terminate the stream.
fn relay_body(
    mut upstream: BoxStream<'static, StreamEvent>,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> {
    async_stream::stream! {
        while let Some(event) = upstream.next().await {
            match event {
                StreamEvent::Chunk(bytes) => yield Ok(bytes),
                StreamEvent::Closed => return,
                StreamEvent::Errored(err) => {
                    tracing::error!("upstream failed mid-stream: {err}");
                    return;
                }
            }
        }
    }
}

/// Create the relay router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(relay_handler))
}
