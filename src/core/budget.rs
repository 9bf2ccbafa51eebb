//! Token budget trimming.
//!
//! Before a conversation is forwarded upstream, the history is cut down to
//! the chronological suffix that fits the model's context window. The walk
//! runs newest to oldest so the most recent exchange always survives
//! trimming first.

use anyhow::Result;
use tiktoken_rs::cl100k_base;

use super::message::Message;
use super::models::ModelDescriptor;

/// Tokens held back for the completion framing the provider itself adds.
pub const COMPLETION_RESERVE_TOKENS: usize = 3;

/// The window of history that fits the model's budget, plus the total token
/// estimate it consumes. Recomputed on every request; the history changes
/// between turns so this is never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedContext {
    pub messages: Vec<Message>,
    pub token_count: usize,
}

/// Select the suffix of `history` that fits `model`'s token limit after the
/// system prompt and the completion reserve are accounted for.
///
/// The returned messages are a contiguous, order-preserving suffix of the
/// input ending at the newest message, and `token_count` never exceeds
/// `model.token_limit`. If even the newest message does not fit the window is
/// empty; the caller decides whether to proceed without context.
///
/// The encoder is acquired for the duration of this call only and released
/// on every exit path. An encoder failure aborts before any network call is
/// made.
pub fn trim_history(
    system_prompt: &str,
    history: &[Message],
    model: &ModelDescriptor,
) -> Result<TrimmedContext> {
    let bpe = cl100k_base()?;
    let budget = model.token_limit.saturating_sub(COMPLETION_RESERVE_TOKENS);

    let mut token_count =
        bpe.encode_with_special_tokens(system_prompt).len() + model.per_message_overhead;

    let mut kept: Vec<Message> = Vec::new();
    for msg in history.iter().rev() {
        let cost =
            bpe.encode_with_special_tokens(&msg.content).len() + model.per_message_overhead;
        if token_count + cost > budget {
            break;
        }
        token_count += cost;
        kept.push(msg.clone());
    }
    // The walk collected newest-first; flip back to chronological order.
    kept.reverse();

    Ok(TrimmedContext {
        messages: kept,
        token_count: token_count + COMPLETION_RESERVE_TOKENS,
    })
}
