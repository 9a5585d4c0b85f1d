//! Completion transport: provider abstraction + OpenRouter implementation.
//!
//! Providers do the *real* remote call (or pretend to, in tests). Prompt
//! building and output interpretation live one level up in
//! [`crate::llm::completion`] and [`crate::llm::analysis`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::LlmSettings;
use crate::error::LlmError;
use crate::text::truncate_chars;

/// Everything about a completion except the user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion and return the assistant message text.
    async fn complete(&self, profile: &ModelProfile, prompt: &str) -> Result<String, LlmError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynProvider = Arc<dyn ChatProvider>;

// ------------------------------------------------------------
// OpenRouter (OpenAI-compatible chat completions)
// ------------------------------------------------------------

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenRouterProvider {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    referer: String,
    app_title: String,
    max_attempts: u32,
    backoff_ms: u64,
}

impl OpenRouterProvider {
    pub fn new(settings: &LlmSettings, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fb-rag-chatbot/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(settings.timeout_secs.min(10)))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_url: settings.api_url.clone(),
            api_key: api_key.to_string(),
            referer: settings.referer.clone(),
            app_title: settings.app_title.clone(),
            max_attempts: settings.max_retries.max(1),
            backoff_ms: settings.retry_backoff_ms,
        })
    }

    async fn send_once(&self, req: &Req<'_>) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(req)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        debug!(%status, model = req.model, "completion response");
        match status {
            StatusCode::UNAUTHORIZED => {
                error!("unauthorized: invalid API key");
                return Err(LlmError::Unauthorized);
            }
            StatusCode::FORBIDDEN => {
                error!(model = req.model, "forbidden: no access to model");
                return Err(LlmError::Forbidden(req.model.to_string()));
            }
            StatusCode::NOT_FOUND => {
                error!(model = req.model, "model not found");
                return Err(LlmError::ModelNotFound(req.model.to_string()));
            }
            s if !s.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(LlmError::RequestFailed(format!(
                    "upstream status {s}: {}",
                    truncate_chars(body.trim(), 200)
                )));
            }
            _ => {}
        }

        let body: Resp = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout { attempts: 1 }
            } else if e.is_decode() {
                LlmError::MalformedResponse(e.to_string())
            } else {
                LlmError::RequestFailed(e.to_string())
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                LlmError::MalformedResponse("response has no choices[0].message.content".into())
            })
    }
}

fn classify_transport(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout { attempts: 1 }
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl ChatProvider for OpenRouterProvider {
    async fn complete(&self, profile: &ModelProfile, prompt: &str) -> Result<String, LlmError> {
        let req = Req {
            model: &profile.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &profile.system_prompt,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: profile.temperature,
            max_tokens: profile.max_tokens,
            stream: false,
            top_p: profile.top_p,
        };

        let mut last = LlmError::RequestFailed("no attempt made".into());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                counter!("llm_retries_total").increment(1);
                if self.backoff_ms > 0 {
                    let shift = (attempt - 2).min(6);
                    tokio::time::sleep(Duration::from_millis(self.backoff_ms << shift)).await;
                }
            }
            counter!("llm_requests_total").increment(1);

            match self.send_once(&req).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() => {
                    warn!(attempt, max_attempts = self.max_attempts, error = %e, "completion attempt failed");
                    last = e;
                }
                Err(e) => {
                    counter!("llm_failures_total").increment(1);
                    return Err(e);
                }
            }
        }

        counter!("llm_failures_total").increment(1);
        Err(match last {
            LlmError::Timeout { .. } => LlmError::Timeout {
                attempts: self.max_attempts,
            },
            LlmError::MalformedResponse(m) => {
                LlmError::RequestFailed(format!("malformed model response: {m}"))
            }
            other => other,
        })
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

// ------------------------------------------------------------
// Scripted provider for tests/local runs
// ------------------------------------------------------------

type Responder = dyn Fn(&ModelProfile, &str) -> Result<String, LlmError> + Send + Sync;

/// Answers from a closure instead of the network and records every prompt.
pub struct ScriptedProvider {
    responder: Box<Responder>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ModelProfile, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`.
    pub fn fixed(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(&self, profile: &ModelProfile, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        (self.responder)(profile, prompt)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
