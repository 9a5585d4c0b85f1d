// src/config/llm.rs
use serde::{Deserialize, Serialize};

pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

fn default_api_url() -> String {
    OPENROUTER_CHAT_URL.to_string()
}
fn default_chat_model() -> String {
    "mistralai/mistral-7b-instruct".to_string()
}
fn default_analysis_model() -> String {
    "deepseek/deepseek-r1-zero:free".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_referer() -> String {
    "http://localhost:8000".to_string()
}
fn default_app_title() -> String {
    "Facebook RAG Chatbot".to_string()
}

/// `[llm]` table of the service config: where and how completions are requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Model answering `/chat`.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used for post analysis and knowledge search.
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per completion, including the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts, doubled on each retry. 0 disables the wait.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Sent as `HTTP-Referer`; OpenRouter uses it for app attribution.
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Sent as `X-Title`.
    #[serde(default = "default_app_title")]
    pub app_title: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            chat_model: default_chat_model(),
            analysis_model: default_analysis_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            referer: default_referer(),
            app_title: default_app_title(),
        }
    }
}

impl LlmSettings {
    /// Replace nonsensical values with defaults instead of failing startup.
    pub fn sanitize(&mut self) {
        self.api_url = self.api_url.trim().to_string();
        if self.api_url.is_empty() {
            self.api_url = default_api_url();
        }
        if self.chat_model.trim().is_empty() {
            self.chat_model = default_chat_model();
        }
        if self.analysis_model.trim().is_empty() {
            self.analysis_model = default_analysis_model();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.max_retries == 0 {
            self.max_retries = 1;
        }
    }
}
