//! The upstream stream adapter.
//!
//! Issues a built [`ProviderRequest`] and normalizes whatever comes back --
//! an SSE stream or a single JSON body -- into a uniform sequence of
//! [`StreamEvent`]s. Exactly one terminal event (`Closed` or `Errored`) is
//! produced per request, and no chunk ever follows it.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::error::UpstreamError;
use super::request::{ProviderRequest, ResponseShape};
use super::sse::SseParser;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug)]
pub enum StreamEvent {
    /// A textual delta, encoded as bytes, to be applied in arrival order.
    Chunk(Bytes),
    /// The upstream finished cleanly.
    Closed,
    /// The upstream failed; no further events follow.
    Errored(UpstreamError),
}

// The incremental chat-completion chunk shape shared by the OpenAI and
// gateway families.
#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    choices: Vec<ChunkChoice>,
}

enum Frame {
    Delta(String),
    Done,
    Skip,
}

fn parse_frame(payload: &str) -> Result<Frame, UpstreamError> {
    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| UpstreamError::Protocol(format!("bad completion chunk: {e}")))?;

    // Usage-only frames arrive with an empty choices array.
    let Some(choice) = chunk.choices.first() else {
        return Ok(Frame::Skip);
    };
    if choice.finish_reason.is_some() {
        return Ok(Frame::Done);
    }
    match &choice.delta.content {
        Some(content) if !content.is_empty() => Ok(Frame::Delta(content.clone())),
        _ => Ok(Frame::Skip),
    }
}

/// Classify a non-2xx response. Providers that return the structured
/// `{"error": {message, type, param, code}}` body get their fields captured;
/// anything else degrades to the bare status.
fn parse_error_body(status: StatusCode, body: &str) -> UpstreamError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
            let field = |name: &str| {
                value
                    .pointer(&format!("/error/{name}"))
                    .filter(|v| !v.is_null())
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
            };
            return UpstreamError::Provider {
                status,
                message: message.to_string(),
                kind: field("type"),
                param: field("param"),
                code: field("code"),
            };
        }
    }
    UpstreamError::Status(status)
}

fn sse_events(response: reqwest::Response) -> impl futures_util::Stream<Item = StreamEvent> {
    async_stream::stream! {
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield StreamEvent::Errored(e.into());
                    return;
                }
            };
            parser.push(&chunk);

            while let Some(payload) = parser.next_event() {
                if payload == DONE_SENTINEL {
                    yield StreamEvent::Closed;
                    return;
                }
                match parse_frame(&payload) {
                    Ok(Frame::Delta(text)) => {
                        yield StreamEvent::Chunk(Bytes::from(text.into_bytes()));
                    }
                    Ok(Frame::Done) => {
                        yield StreamEvent::Closed;
                        return;
                    }
                    Ok(Frame::Skip) => {}
                    Err(e) => {
                        yield StreamEvent::Errored(e);
                        return;
                    }
                }
            }
        }

        // Upstream hung up without a terminal sentinel; treat it as a clean
        // end since the wire gives us nothing better to report.
        yield StreamEvent::Closed;
    }
}

fn single_shot_events(response: reqwest::Response) -> impl futures_util::Stream<Item = StreamEvent> {
    async_stream::stream! {
        match response.json::<Value>().await {
            Ok(body) => {
                match body
                    .pointer("/predictions/0/candidates/0/content")
                    .and_then(Value::as_str)
                {
                    Some(text) => {
                        yield StreamEvent::Chunk(Bytes::copy_from_slice(text.as_bytes()));
                        yield StreamEvent::Closed;
                    }
                    None => {
                        yield StreamEvent::Errored(UpstreamError::Protocol(
                            "predict response missing candidate content".to_string(),
                        ));
                    }
                }
            }
            Err(e) => {
                yield StreamEvent::Errored(e.into());
            }
        }
    }
}

/// Send `request` and expose the response as a uniform event stream.
///
/// Failures detected before any byte of completion text is produced --
/// transport errors and non-2xx statuses -- are returned as `Err` so the
/// caller can still answer with a clean error response.
pub async fn open_stream(
    client: &reqwest::Client,
    request: ProviderRequest,
    timeout: Duration,
) -> Result<BoxStream<'static, StreamEvent>, UpstreamError> {
    let mut builder = client
        .request(request.method, &request.url)
        .timeout(timeout)
        .header("content-type", "application/json");
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.json(&request.body).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|_| String::new());
        return Err(parse_error_body(status, &body));
    }

    Ok(match request.shape {
        ResponseShape::Streaming => sse_events(response).boxed(),
        ResponseShape::SingleShot => single_shot_events(response).boxed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppConfig;
    use crate::core::budget::TrimmedContext;
    use crate::core::message::{Message, Role};
    use crate::core::models::ModelRegistry;
    use crate::provider::request::{Requester, build_request};

    fn config_for(url: &str) -> AppConfig {
        AppConfig {
            openai_api_hostname: url.to_string(),
            openai_api_key: "test-key".to_string(),
            openai_api_version: None,
            gateway_api_hostname: None,
            google_api_hostname: url.to_string(),
            google_access_token: "test-token".to_string(),
            google_project_id: "proj".to_string(),
            google_location: "us-central1".to_string(),
            fallback_model: "gpt-3.5-turbo".to_string(),
            default_system_prompt: "You are a helpful assistant.".to_string(),
            default_temperature: 1.0,
            upstream_timeout_secs: 5,
            auth_disabled: true,
        }
    }

    fn openai_request(url: &str) -> ProviderRequest {
        let registry = ModelRegistry::builtin("gpt-3.5-turbo");
        let trimmed = TrimmedContext {
            messages: vec![Message::new(Role::User, "Hi")],
            token_count: 50,
        };
        build_request(
            &trimmed,
            registry.resolve("gpt-4"),
            1.0,
            "Hi",
            &Requester {
                session: "s".to_string(),
                correlation_id: "c".to_string(),
            },
            &config_for(url),
        )
    }

    fn google_request(url: &str) -> ProviderRequest {
        let registry = ModelRegistry::builtin("gpt-3.5-turbo");
        let trimmed = TrimmedContext {
            messages: vec![Message::new(Role::User, "Hi")],
            token_count: 50,
        };
        build_request(
            &trimmed,
            registry.resolve("chat-bison"),
            1.0,
            "Hi",
            &Requester {
                session: "s".to_string(),
                correlation_id: "c".to_string(),
            },
            &config_for(url),
        )
    }

    fn chunk_text(event: &StreamEvent) -> Option<String> {
        match event {
            StreamEvent::Chunk(bytes) => {
                Some(String::from_utf8(bytes.to_vec()).unwrap())
            }
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_streaming_emits_chunks_then_closed() {
        let mut server = mockito::Server::new_async().await;
        let sse_response = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"},\"finish_reason\":null}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"b\"},\"finish_reason\":null}]}\n\n\
data: [DONE]\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(sse_response)
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        // Exactly a, b, Closed -- in that order, nothing after the terminal.
        assert_eq!(events.len(), 3);
        assert_eq!(chunk_text(&events[0]).unwrap(), "a");
        assert_eq!(chunk_text(&events[1]).unwrap(), "b");
        assert!(matches!(events[2], StreamEvent::Closed));
    }

    #[tokio::test]
    async fn test_finish_reason_closes_without_done_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let sse_response = "data: {\"choices\":[{\"delta\":{\"content\":\"hello\"},\"finish_reason\":null}]}\n\n\
data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_response)
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(chunk_text(&events[0]).unwrap(), "hello");
        assert!(matches!(events[1], StreamEvent::Closed));
    }

    #[tokio::test]
    async fn test_role_prelude_frames_are_skipped() {
        let mut server = mockito::Server::new_async().await;
        let sse_response = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"hi\"},\"finish_reason\":null}]}\n\n\
data: [DONE]\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_response)
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(chunk_text(&events[0]).unwrap(), "hi");
        assert!(matches!(events[1], StreamEvent::Closed));
    }

    #[tokio::test]
    async fn test_structured_error_body_is_captured() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(400)
            .with_body(
                r#"{"error":{"message":"bad prompt","type":"invalid_request_error","param":"messages","code":"invalid"}}"#,
            )
            .create();

        let client = reqwest::Client::new();
        let err = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .err()
            .unwrap();

        match err {
            UpstreamError::Provider {
                status,
                message,
                kind,
                param,
                code,
            } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "bad prompt");
                assert_eq!(kind.as_deref(), Some("invalid_request_error"));
                assert_eq!(param.as_deref(), Some("messages"));
                assert_eq!(code.as_deref(), Some("invalid"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unstructured_error_body_degrades_to_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create();

        let client = reqwest::Client::new();
        let err = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, UpstreamError::Status(StatusCode::BAD_GATEWAY)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body(r#"{"error":{"message":"rate limited"}}"#)
            .create();

        let client = reqwest::Client::new();
        let err = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_single_shot_emits_one_chunk_then_closed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "POST",
                "/v1/projects/proj/locations/us-central1/publishers/google/models/chat-bison:predict",
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"predictions":[{"candidates":[{"author":"bot","content":"The whole answer."}]}]}"#,
            )
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, google_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(chunk_text(&events[0]).unwrap(), "The whole answer.");
        assert!(matches!(events[1], StreamEvent::Closed));
    }

    #[tokio::test]
    async fn test_malformed_frame_errors_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let sse_response = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"},\"finish_reason\":null}]}\n\n\
data: this is not json\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"never seen\"},\"finish_reason\":null}]}\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_response)
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(chunk_text(&events[0]).unwrap(), "ok");
        assert!(matches!(events[1], StreamEvent::Errored(UpstreamError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_stream_without_sentinel_still_closes() {
        let mut server = mockito::Server::new_async().await;
        let sse_response =
            "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"},\"finish_reason\":null}]}\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(sse_response)
            .create();

        let client = reqwest::Client::new();
        let stream = open_stream(&client, openai_request(&server.url()), Duration::from_secs(5))
            .await
            .unwrap();
        let events: Vec<StreamEvent> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(chunk_text(&events[0]).unwrap(), "tail");
        assert!(matches!(events[1], StreamEvent::Closed));
    }
}
