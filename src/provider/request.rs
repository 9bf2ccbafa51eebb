//! Mapping a trimmed conversation onto a provider-specific HTTP request.
//!
//! This is a pure function of its inputs: no network I/O happens here, so
//! every wire shape is testable without a live upstream.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use http::Method;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::core::AppConfig;
use crate::core::budget::TrimmedContext;
use crate::core::message::{Message, Role};
use crate::core::models::{ModelDescriptor, ProviderKind};

/// Fixed sampling constants for the predict-style endpoint.
const GOOGLE_TOP_P: f64 = 0.95;
const GOOGLE_TOP_K: u32 = 40;

/// How the upstream will answer: incrementally over SSE frames, or with one
/// complete JSON body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
    Streaming,
    SingleShot,
}

/// A fully-built upstream call, ready for the stream adapter to send.
#[derive(Debug)]
pub struct ProviderRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Value,
    pub shape: ResponseShape,
}

/// The authenticated caller as the builder sees it: an opaque session
/// identity plus the turn's correlation id. The raw identity never leaves
/// this module un-hashed.
#[derive(Clone, Debug)]
pub struct Requester {
    pub session: String,
    pub correlation_id: String,
}

/// One-way hash of the session identity for gateway headers.
fn hash_identity(session: &str) -> String {
    let digest = Sha256::digest(session.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn openai_messages(system_prompt: &str, trimmed: &TrimmedContext) -> Vec<Message> {
    let mut messages = Vec::with_capacity(trimmed.messages.len() + 1);
    messages.push(Message::new(Role::System, system_prompt));
    messages.extend(trimmed.messages.iter().cloned());
    messages
}

fn openai_body(
    trimmed: &TrimmedContext,
    model: &ModelDescriptor,
    temperature: f32,
    system_prompt: &str,
    include_model: bool,
) -> Value {
    let mut body = json!({
        "messages": openai_messages(system_prompt, trimmed),
        "max_tokens": model.token_limit.saturating_sub(trimmed.token_count),
        "temperature": temperature,
        "stream": true,
    });
    // Deployment-style backends name the model in the URL instead.
    if include_model {
        body["model"] = json!(model.id);
    }
    body
}

/// Build the upstream request for a trimmed context. Dispatches on the
/// descriptor's provider kind, resolved once by the registry; unknown ids
/// never reach this point because the registry substitutes the fallback
/// descriptor.
pub fn build_request(
    trimmed: &TrimmedContext,
    model: &ModelDescriptor,
    temperature: f32,
    system_prompt: &str,
    requester: &Requester,
    config: &AppConfig,
) -> ProviderRequest {
    match model.kind {
        ProviderKind::OpenAi => {
            let host = config.openai_api_hostname.trim_end_matches('/');
            match &config.openai_api_version {
                Some(api_version) => ProviderRequest {
                    url: format!(
                        "{}/openai/deployments/{}/chat/completions?api-version={}",
                        host, model.id, api_version
                    ),
                    method: Method::POST,
                    headers: vec![("api-key".to_string(), config.openai_api_key.clone())],
                    body: openai_body(trimmed, model, temperature, system_prompt, false),
                    shape: ResponseShape::Streaming,
                },
                None => ProviderRequest {
                    url: format!("{}/v1/chat/completions", host),
                    method: Method::POST,
                    headers: vec![(
                        "authorization".to_string(),
                        format!("Bearer {}", config.openai_api_key),
                    )],
                    body: openai_body(trimmed, model, temperature, system_prompt, true),
                    shape: ResponseShape::Streaming,
                },
            }
        }
        ProviderKind::Bedrock => {
            let host = config
                .gateway_api_hostname
                .as_deref()
                .unwrap_or(&config.openai_api_hostname)
                .trim_end_matches('/');
            ProviderRequest {
                url: format!("{}/v1/chat/completions", host),
                method: Method::POST,
                headers: vec![
                    (
                        "x-caller-hash".to_string(),
                        hash_identity(&requester.session),
                    ),
                    (
                        "x-correlation-id".to_string(),
                        requester.correlation_id.clone(),
                    ),
                ],
                body: openai_body(trimmed, model, temperature, system_prompt, true),
                shape: ResponseShape::Streaming,
            }
        }
        ProviderKind::Google => {
            let host = config.google_api_hostname.trim_end_matches('/');
            let messages: Vec<Value> = trimmed
                .messages
                .iter()
                .map(|m| {
                    let author = match m.role {
                        Role::Assistant => "bot",
                        _ => "user",
                    };
                    json!({ "author": author, "content": m.content })
                })
                .collect();
            ProviderRequest {
                url: format!(
                    "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
                    host, config.google_project_id, config.google_location, model.id
                ),
                method: Method::POST,
                headers: vec![(
                    "authorization".to_string(),
                    format!("Bearer {}", config.google_access_token),
                )],
                body: json!({
                    "instances": [{
                        "context": system_prompt,
                        "examples": [],
                        "messages": messages,
                    }],
                    "parameters": {
                        "temperature": temperature,
                        "topP": GOOGLE_TOP_P,
                        "topK": GOOGLE_TOP_K,
                        "maxOutputTokens": model.max_output_tokens,
                    },
                }),
                shape: ResponseShape::SingleShot,
            }
        }
    }
}
