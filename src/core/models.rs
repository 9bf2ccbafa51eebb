//! The model registry: which models exist, what their budgets are, and which
//! upstream provider family serves them.
//!
//! The registry is built once at startup and never mutated afterwards so it
//! can be shared across requests without locking.

use std::collections::HashMap;

/// Which upstream wire format a model speaks. Resolved once per request from
/// the descriptor, never re-derived from the model id string at call sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Direct OpenAI API or an Azure-hosted deployment (same request and
    /// response shape, different URL template and auth header).
    OpenAi,
    /// Vertex-style predict endpoint. Single-shot only.
    Google,
    /// An OpenAI-compatible gateway in front of Bedrock models.
    Bedrock,
}

#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub token_limit: usize,
    pub max_output_tokens: usize,
    /// Fixed framing cost the provider charges per message on top of the
    /// content tokens. 0 for the Google family, 4 or 5 for the chat-markup
    /// families.
    pub per_message_overhead: usize,
    pub kind: ProviderKind,
    pub default: bool,
}

impl ModelDescriptor {
    fn new(
        id: &str,
        name: &str,
        token_limit: usize,
        max_output_tokens: usize,
        per_message_overhead: usize,
        kind: ProviderKind,
        default: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            token_limit,
            max_output_tokens,
            per_message_overhead,
            kind,
            default,
        }
    }
}

pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
    fallback_id: String,
}

impl ModelRegistry {
    /// Build a registry from an explicit descriptor list. The fallback id
    /// must name one of the descriptors since unknown inbound ids resolve to
    /// it.
    pub fn new(models: Vec<ModelDescriptor>, fallback_id: &str) -> Self {
        assert!(
            models.iter().any(|m| m.id == fallback_id),
            "fallback model {fallback_id} is not in the registry"
        );
        let models = models.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self {
            models,
            fallback_id: fallback_id.to_string(),
        }
    }

    /// The built-in model catalog.
    pub fn builtin(fallback_id: &str) -> Self {
        use ProviderKind::*;

        let models = vec![
            ModelDescriptor::new("gpt-3.5-turbo", "GPT-3.5", 4096, 1024, 5, OpenAi, true),
            ModelDescriptor::new(
                "gpt-3.5-turbo-16k",
                "GPT-3.5 16K",
                16384,
                2048,
                5,
                OpenAi,
                false,
            ),
            ModelDescriptor::new("gpt-4", "GPT-4", 8192, 2048, 4, OpenAi, false),
            ModelDescriptor::new("gpt-4-32k", "GPT-4 32K", 32768, 4096, 4, OpenAi, false),
            ModelDescriptor::new("chat-bison", "PaLM Chat", 8192, 1024, 0, Google, false),
            ModelDescriptor::new(
                "anthropic.claude-v2",
                "Claude 2",
                100000,
                2048,
                4,
                Bedrock,
                false,
            ),
            ModelDescriptor::new(
                "anthropic.claude-instant-v1",
                "Claude Instant",
                100000,
                2048,
                4,
                Bedrock,
                false,
            ),
        ];
        Self::new(models, fallback_id)
    }

    /// Look up a descriptor by id. Unknown ids resolve to the configured
    /// fallback model so a stale client can't produce a hard failure.
    pub fn resolve(&self, id: &str) -> &ModelDescriptor {
        self.models.get(id).unwrap_or_else(|| {
            self.models
                .get(&self.fallback_id)
                .expect("fallback model is always registered")
        })
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.models.values()
    }
}
