//! Session-token middleware.
//!
//! Token validation itself belongs to an external collaborator; this layer
//! only requires that a bearer token is present (unless auth is disabled by
//! configuration) and threads it through as an opaque identity. The identity
//! is used for the hashed gateway header and correlation only -- it is never
//! persisted.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};

use super::state::SharedState;

/// The authenticated caller, available to handlers as a request extension.
#[derive(Clone, Debug)]
pub struct CallerIdentity {
    pub session: String,
}

pub async fn require_session(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Response {
    if state.config.auth_disabled {
        request.extensions_mut().insert(CallerIdentity {
            session: "anonymous".to_string(),
        });
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.to_string());

    match token {
        Some(token) if !token.is_empty() => {
            request.extensions_mut().insert(CallerIdentity {
                session: token,
            });
            next.run(request).await
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            "Missing or invalid session token",
        )
            .into_response(),
    }
}
