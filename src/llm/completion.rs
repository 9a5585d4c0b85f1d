use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{DynProvider, ModelProfile};
use crate::text::truncate_chars;

pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a chatbot specialised in Facebook. Answer the question from your own knowledge.";

pub const ANALYST_SYSTEM_PROMPT: &str = "You are an AI assistant specialised in Facebook, able to \
     analyse text and find accurate information. When asked for JSON, return only JSON.";

/// Labels returned with every chat answer. They are fixed and say nothing about
/// where the answer came from.
pub const CHAT_SOURCES: [&str; 3] = [
    "Facebook Marketing Guide 2024",
    "Social Media Best Practices",
    "Facebook Algorithm Updates",
];

impl ModelProfile {
    /// Profile answering end-user questions on `/chat`.
    pub fn chat(model: &str) -> Self {
        Self {
            model: model.to_string(),
            system_prompt: CHAT_SYSTEM_PROMPT.to_string(),
            max_tokens: 500,
            temperature: 0.7,
            top_p: None,
        }
    }

    /// Profile for the JSON-emitting analysis and knowledge-search prompts.
    pub fn analysis(model: &str) -> Self {
        Self {
            model: model.to_string(),
            system_prompt: ANALYST_SYSTEM_PROMPT.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            top_p: Some(0.95),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub answer: String,
    pub sources: Vec<String>,
}

/// A provider bound to one model profile.
pub struct CompletionClient {
    provider: DynProvider,
    profile: ModelProfile,
}

impl CompletionClient {
    pub fn new(provider: DynProvider, profile: ModelProfile) -> Self {
        Self { provider, profile }
    }

    /// Answer a user question. `sources` is always [`CHAT_SOURCES`].
    pub async fn complete(&self, question: &str) -> Result<Completion, LlmError> {
        let answer = self.complete_text(question).await?;
        Ok(Completion {
            answer,
            sources: CHAT_SOURCES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Raw assistant text for `prompt`.
    pub async fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(
            provider = self.provider.name(),
            model = %self.profile.model,
            prompt = %truncate_chars(prompt, 120),
            "completion request"
        );
        self.provider.complete(&self.profile, prompt).await
    }
}
