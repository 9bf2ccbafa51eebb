//! The client-side stream consumer and conversation state machine.
//!
//! A session drives one conversation against a running relay: submit,
//! regenerate, and edit all funnel into the same turn loop, which consumes
//! the relay's chunked byte stream and grows the last assistant message as
//! deltas arrive. Cancellation is cooperative: the token is checked before
//! each read, so a chunk already received is still applied before the loop
//! exits, and nothing already shown is rolled back.

use std::sync::Arc;

use anyhow::{Result, bail, ensure};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::conversation::Conversation;
use crate::core::message::{Message, Role};

/// Live state of the turn loop. Terminal conditions (cancelled, errored)
/// settle back to `Idle` and are reported through [`TurnOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sending,
    Streaming,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

/// Persistence boundary. Snapshots are handed off after each completed or
/// cancelled turn; the session never reads or writes storage itself.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn persist(&self, snapshot: Arc<Conversation>) -> Result<()>;
}

pub struct ChatSession {
    relay_url: String,
    session_token: Option<String>,
    client: reqwest::Client,
    conversation: Arc<Conversation>,
    state: SessionState,
    cancel: CancellationToken,
    store: Option<Box<dyn ConversationStore>>,
    delta_tx: Option<mpsc::UnboundedSender<String>>,
}

impl ChatSession {
    pub fn builder(relay_url: &str, model_id: &str) -> ChatSessionBuilder {
        ChatSessionBuilder::new(relay_url, model_id)
    }

    /// The current immutable snapshot. Safe to hold across turns; it will
    /// never change underneath the caller.
    pub fn snapshot(&self) -> Arc<Conversation> {
        Arc::clone(&self.conversation)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// A handle for requesting cancellation of the in-flight turn from
    /// another task.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn install(&mut self, next: Conversation) {
        self.conversation = Arc::new(next);
    }

    /// Append a provisional user message and run a turn against the relay.
    pub async fn submit(&mut self, text: &str) -> Result<TurnOutcome> {
        self.install(self.conversation.with_message(Message::new(Role::User, text)));
        self.run_turn().await
    }

    /// Discard the trailing user/assistant pair and resubmit the same user
    /// content for a fresh completion.
    pub async fn regenerate(&mut self) -> Result<TurnOutcome> {
        let Some(content) = self.conversation.regenerate_target() else {
            bail!("nothing to regenerate: conversation does not end in a user/assistant pair");
        };
        let keep = self.conversation.messages.len() - 2;
        self.install(self.conversation.with_truncated(keep));
        self.submit(&content).await
    }

    /// Discard the message at `index` and everything after it, then submit
    /// the edited content in its place.
    pub async fn edit(&mut self, index: usize, text: &str) -> Result<TurnOutcome> {
        ensure!(
            index < self.conversation.messages.len(),
            "edit index {index} is out of range"
        );
        self.install(self.conversation.with_truncated(index));
        self.submit(text).await
    }

    async fn run_turn(&mut self) -> Result<TurnOutcome> {
        self.state = SessionState::Sending;

        let conversation = self.snapshot();
        let body = json!({
            "modelId": conversation.model_id,
            "messages": conversation.messages,
            "systemPrompt": conversation.system_prompt,
            "temperature": conversation.temperature,
            "addonIds": conversation.addon_ids,
            "correlationId": Uuid::new_v4().to_string(),
        });

        let mut request = self.client.post(&self.relay_url).json(&body);
        if let Some(token) = &self.session_token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.state = SessionState::Idle;
                return Ok(TurnOutcome::Failed(format!("request failed: {e}")));
            }
        };

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            self.state = SessionState::Idle;
            return Ok(TurnOutcome::Failed(error_text));
        }

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut cancelled = false;

        loop {
            // Cooperative cancellation: checked between reads, never
            // preemptively. A chunk already decoded stays applied.
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(chunk) = stream.next().await else {
                break;
            };
            match chunk {
                Ok(bytes) => {
                    if self.state == SessionState::Sending {
                        // First chunk: the assistant message exists from here
                        // on and only ever grows.
                        self.install(
                            self.conversation
                                .with_message(Message::new(Role::Assistant, "")),
                        );
                        self.state = SessionState::Streaming;
                    }
                    let text = decode_utf8_chunk(&mut pending, &bytes);
                    if text.is_empty() {
                        continue;
                    }
                    self.install(self.conversation.with_delta_to_last(&text));
                    if let Some(tx) = &self.delta_tx {
                        let _ = tx.send(text);
                    }
                }
                Err(e) => {
                    self.state = SessionState::Idle;
                    return Ok(TurnOutcome::Failed(format!("stream read failed: {e}")));
                }
            }
        }
        // Dropping the stream aborts the in-flight request on cancellation.
        drop(stream);

        if cancelled {
            // Leave a fresh token behind so the session stays usable.
            self.cancel = CancellationToken::new();
        }

        if let Some(store) = &self.store {
            store.persist(self.snapshot()).await?;
        }
        self.state = SessionState::Idle;

        Ok(if cancelled {
            TurnOutcome::Cancelled
        } else {
            TurnOutcome::Completed
        })
    }
}

/// Decode as much of the accumulated bytes as form valid UTF-8. A split
/// multi-byte sequence at the chunk boundary stays in `pending` until its
/// tail arrives; a genuinely invalid byte is replaced so the stream can't
/// stall.
fn decode_utf8_chunk(pending: &mut Vec<u8>, chunk: &[u8]) -> String {
    pending.extend_from_slice(chunk);
    let mut out = String::new();
    loop {
        match std::str::from_utf8(pending) {
            Ok(text) => {
                out.push_str(text);
                pending.clear();
                break;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&pending[..valid]));
                match e.error_len() {
                    Some(len) => {
                        out.push('\u{FFFD}');
                        pending.drain(..valid + len);
                    }
                    None => {
                        pending.drain(..valid);
                        break;
                    }
                }
            }
        }
    }
    out
}

#[derive(Default)]
pub struct ChatSessionBuilder {
    relay_url: String,
    model_id: String,
    system_prompt: String,
    temperature: f32,
    session_token: Option<String>,
    store: Option<Box<dyn ConversationStore>>,
    delta_tx: Option<mpsc::UnboundedSender<String>>,
}

impl ChatSessionBuilder {
    pub fn new(relay_url: &str, model_id: &str) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            model_id: model_id.to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            temperature: 1.0,
            session_token: None,
            store: None,
            delta_tx: None,
        }
    }

    pub fn system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn session_token(mut self, token: &str) -> Self {
        self.session_token = Some(token.to_string());
        self
    }

    pub fn store(mut self, store: Box<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stream decoded deltas to `tx` as they are applied, for incremental
    /// rendering.
    pub fn deltas(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.delta_tx = Some(tx);
        self
    }

    pub fn build(self) -> ChatSession {
        let conversation =
            Conversation::new(&self.model_id, &self.system_prompt, self.temperature);
        ChatSession {
            relay_url: self.relay_url,
            session_token: self.session_token,
            client: reqwest::Client::new(),
            conversation: Arc::new(conversation),
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            store: self.store,
            delta_tx: self.delta_tx,
        }
    }
}
