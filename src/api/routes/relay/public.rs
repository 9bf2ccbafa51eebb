//! Public types for the relay API

use serde::Deserialize;

use crate::core::message::Message;

/// The inbound relay request. Constructed fresh by the caller for every
/// turn; never reused.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    /// Optional capability modules selected for the conversation. Opaque to
    /// the relay; carried for audit logging only.
    #[serde(default)]
    pub addon_ids: Vec<String>,
    pub correlation_id: String,
}
