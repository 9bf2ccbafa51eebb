//! Upstream failure taxonomy.

use http::StatusCode;
use thiserror::Error;

/// Fixed message returned to callers for overload/timeout classes and for
/// anything we can't attribute to the provider. Provider messages for these
/// classes tend to leak capacity details, so they are never relayed.
pub const GENERIC_UPSTREAM_ERROR: &str =
    "The upstream model service is temporarily unavailable. Please try again shortly.";

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The provider returned a structured error body.
    #[error("upstream error ({status}): {message}")]
    Provider {
        status: StatusCode,
        message: String,
        kind: Option<String>,
        param: Option<String>,
        code: Option<String>,
    },

    /// Non-2xx with a body we couldn't make sense of.
    #[error("upstream returned status {0}")]
    Status(StatusCode),

    /// Connection or timeout failure before or during the exchange.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider responded 2xx but the payload didn't match its own wire
    /// format.
    #[error("malformed upstream response: {0}")]
    Protocol(String),
}

impl UpstreamError {
    /// Rate-limit and gateway-timeout classes. These get the fixed generic
    /// client message rather than the provider's own text.
    pub fn is_transient(&self) -> bool {
        let status = match self {
            UpstreamError::Provider { status, .. } => Some(*status),
            UpstreamError::Status(status) => Some(*status),
            _ => None,
        };
        matches!(
            status,
            Some(StatusCode::TOO_MANY_REQUESTS) | Some(StatusCode::GATEWAY_TIMEOUT)
        )
    }

    /// The error text shown to the caller, per the relay's mapping policy.
    pub fn client_message(&self) -> String {
        match self {
            _ if self.is_transient() => GENERIC_UPSTREAM_ERROR.to_string(),
            UpstreamError::Provider { message, .. } => message.clone(),
            _ => GENERIC_UPSTREAM_ERROR.to_string(),
        }
    }
}
