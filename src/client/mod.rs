pub mod conversation;
pub mod session;

pub use conversation::Conversation;
pub use session::{
    ChatSession, ChatSessionBuilder, ConversationStore, SessionState, TurnOutcome,
};
