//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

use crate::provider::UpstreamError;

// Errors

pub struct ApiError(anyhow::Error);

/// Convert `ApiError` into an Axum compatible response, applying the relay's
/// error mapping: transient upstream classes (429/504) and anything
/// unattributable get a fixed generic message; structured provider errors
/// relay the provider's own text. Everything surfaces as a 500 -- the caller
/// can't do anything different per class.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{}", self.0);

        if let Some(upstream) = self.0.downcast_ref::<UpstreamError>() {
            return (StatusCode::INTERNAL_SERVER_ERROR, upstream.client_message())
                .into_response();
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod models {
    pub use crate::api::routes::models::public::*;
}

pub mod relay {
    pub use crate::api::routes::relay::public::*;
}
