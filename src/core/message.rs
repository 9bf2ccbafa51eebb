//! The message type shared by the relay API, the provider builders, and the
//! client conversation state.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    // Thumbs up/down left by the user on an assistant message. Not part of
    // any upstream wire format, so it never serializes when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i8>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            rating: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            r#""assistant""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    }

    #[test]
    fn test_message_wire_shape_omits_unset_rating() {
        let msg = Message::new(Role::User, "Hello world");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"Hello world"}"#
        );
    }

    #[test]
    fn test_message_round_trips_rating() {
        let mut msg = Message::new(Role::Assistant, "Sure thing");
        msg.rating = Some(1);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""rating":1"#));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_message_deserializes_without_rating() {
        let parsed: Message =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(parsed.rating, None);
    }
}
