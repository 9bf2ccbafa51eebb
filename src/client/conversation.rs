//! The conversation container on the caller side.
//!
//! Mutation happens only through the session state machine, and always as
//! "build a new value, install it as a fresh snapshot" -- concurrent readers
//! holding an older `Arc<Conversation>` never observe a half-applied update.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::message::{Message, Role};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<Message>,
    pub model_id: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub addon_ids: Vec<String>,
    pub streaming: bool,
}

impl Conversation {
    pub fn new(model_id: &str, system_prompt: &str, temperature: f32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            model_id: model_id.to_string(),
            system_prompt: system_prompt.to_string(),
            temperature,
            addon_ids: Vec::new(),
            streaming: true,
        }
    }

    /// A copy with `message` appended.
    pub fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }

    /// A copy with `delta` appended to the content of the last message.
    /// Streaming only ever grows the tail; earlier content is never
    /// rewritten or reordered.
    pub fn with_delta_to_last(&self, delta: &str) -> Self {
        let mut next = self.clone();
        if let Some(last) = next.messages.last_mut() {
            last.content.push_str(delta);
        }
        next
    }

    /// A copy truncated to the first `len` messages.
    pub fn with_truncated(&self, len: usize) -> Self {
        let mut next = self.clone();
        next.messages.truncate(len);
        next
    }

    /// The user content to resend for a regenerate: only available when the
    /// conversation ends in a complete user/assistant pair.
    pub fn regenerate_target(&self) -> Option<String> {
        let n = self.messages.len();
        if n < 2 {
            return None;
        }
        let (user, assistant) = (&self.messages[n - 2], &self.messages[n - 1]);
        if user.role == Role::User && assistant.role == Role::Assistant {
            Some(user.content.clone())
        } else {
            None
        }
    }
}
