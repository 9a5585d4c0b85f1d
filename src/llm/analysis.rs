// src/llm/analysis.rs
//! Prompt builders for text analysis and knowledge search, plus the boundary
//! step that turns model output into typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::LlmError;
use crate::knowledge::types::KnowledgeEntry;
use crate::llm::completion::CompletionClient;
use crate::text::truncate_chars;

/// At most this many knowledge matches are returned per query.
pub const MAX_MATCHES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    General,
    Sentiment,
}

impl AnalysisMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMode::General => "general",
            AnalysisMode::Sentiment => "sentiment",
        }
    }

    fn prompt(self, text: &str) -> String {
        match self {
            AnalysisMode::General => format!(
                "Analyze the following text in detail:\n\n\
                 {text}\n\n\
                 Provide:\n\
                 1. A summary of the main content\n\
                 2. The topics it covers\n\
                 3. Its emotion and tone\n\
                 4. The key points\n\n\
                 Return format:\n\
                 {{\n    \"summary\": \"summary\",\n    \"topics\": [\"topic 1\", \"topic 2\"],\n    \
                 \"sentiment\": \"sentiment\",\n    \"key_points\": [\"point 1\", \"point 2\"]\n}}"
            ),
            AnalysisMode::Sentiment => format!(
                "Analyze the sentiment of the following text:\n\n\
                 {text}\n\n\
                 Provide:\n\
                 1. The main sentiment (positive/negative/neutral)\n\
                 2. Its intensity (0-1)\n\
                 3. The emotional keywords\n\n\
                 Return format:\n\
                 {{\n    \"sentiment\": \"sentiment\",\n    \"intensity\": 0.5,\n    \
                 \"keywords\": [\"word 1\", \"word 2\"]\n}}"
            ),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisMode {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(AnalysisMode::General),
            "sentiment" => Ok(AnalysisMode::Sentiment),
            other => Err(LlmError::UnsupportedMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralAnalysis {
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    pub sentiment: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentAnalysis {
    pub sentiment: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub intensity: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// One ranked hit from the knowledge search. The enrichment fields stay empty
/// until [`KnowledgeMatch::enrich`] is called.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KnowledgeMatch {
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub relevance: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl KnowledgeMatch {
    /// Placeholder used when the model output cannot be parsed.
    pub fn not_found() -> Self {
        Self {
            text: "No relevant information found".to_string(),
            relevance: 0.0,
            source: "N/A".to_string(),
            explanation: "Could not interpret the search result returned by the API".to_string(),
            ..Self::default()
        }
    }

    /// Placeholder used when the search completion itself failed.
    pub fn search_error(e: &LlmError) -> Self {
        Self {
            text: "An error occurred while searching".to_string(),
            relevance: 0.0,
            source: "N/A".to_string(),
            explanation: e.to_string(),
            ..Self::default()
        }
    }

    pub fn enrich(&mut self, analysis: GeneralAnalysis) {
        self.summary = analysis.summary;
        self.topics = analysis.topics;
        self.sentiment = analysis.sentiment;
        self.key_points = analysis.key_points;
    }
}

/// Numbers, numeric strings and null all become an `f64`; anything
/// unparseable or non-finite becomes 0.
fn lenient_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if n.is_finite() { n } else { 0.0 })
}

/// Strip a surrounding markdown code fence (```json ... ```) if present.
pub fn extract_json_payload(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    // drop the info string (`json`) up to the first newline
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_json_value(raw: &str) -> Result<Value, LlmError> {
    serde_json::from_str(extract_json_payload(raw)).map_err(|e| {
        LlmError::MalformedResponse(format!("{e}; output: {}", truncate_chars(raw.trim(), 160)))
    })
}

/// Turn raw knowledge-search output into at most [`MAX_MATCHES`] matches,
/// best first. Unparseable output, or a list holding anything but objects,
/// yields [`KnowledgeMatch::not_found`]; a single object is treated as a
/// one-element list.
pub fn rank_matches(raw: &str) -> Vec<KnowledgeMatch> {
    let value = match parse_json_value(raw) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "knowledge search returned unparseable JSON");
            return vec![KnowledgeMatch::not_found()];
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };
    if items.iter().any(|v| !v.is_object()) {
        error!("knowledge search returned non-object matches");
        return vec![KnowledgeMatch::not_found()];
    }

    let mut matches: Vec<KnowledgeMatch> = items
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<KnowledgeMatch>(v) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = %e, "skipping malformed knowledge match");
                None
            }
        })
        .collect();

    matches.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    matches.truncate(MAX_MATCHES);
    matches
}

fn knowledge_prompt(query: &str, knowledge_base: &[KnowledgeEntry]) -> String {
    let kb_text = knowledge_base
        .iter()
        .map(|e| format!("Title: {}\nContent: {}\n", e.title, e.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Find information related to the following question in the knowledge base:\n\n\
         Question: {query}\n\n\
         Knowledge base:\n{kb_text}\n\n\
         Return the most relevant passages as JSON in this format:\n\
         [\n    {{\n        \"text\": \"relevant passage\",\n        \"relevance\": 0.8,\n        \
         \"source\": \"information source\",\n        \
         \"explanation\": \"why this passage is relevant\"\n    }}\n]\n\n\
         Return only JSON, without any other text."
    )
}

/// Analysis and knowledge search on top of a [`CompletionClient`] bound to the
/// analysis profile.
pub struct TextAnalyzer {
    client: CompletionClient,
}

impl TextAnalyzer {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Run a mode-specific analysis and return the JSON object the model emitted.
    pub async fn analyze(&self, text: &str, mode: AnalysisMode) -> Result<Value, LlmError> {
        let raw = self.client.complete_text(&mode.prompt(text)).await?;
        let value = parse_json_value(&raw)?;
        if !value.is_object() {
            return Err(LlmError::MalformedResponse(format!(
                "{mode} analysis is not a JSON object"
            )));
        }
        Ok(value)
    }

    /// Like [`TextAnalyzer::analyze`] but with the mode given by name.
    pub async fn analyze_named(&self, text: &str, mode: &str) -> Result<Value, LlmError> {
        let mode = mode.parse::<AnalysisMode>()?;
        self.analyze(text, mode).await
    }

    pub async fn analyze_general(&self, text: &str) -> Result<GeneralAnalysis, LlmError> {
        let v = self.analyze(text, AnalysisMode::General).await?;
        serde_json::from_value(v).map_err(|e| LlmError::MalformedResponse(format!("general analysis: {e}")))
    }

    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentAnalysis, LlmError> {
        let v = self.analyze(text, AnalysisMode::Sentiment).await?;
        serde_json::from_value(v).map_err(|e| LlmError::MalformedResponse(format!("sentiment analysis: {e}")))
    }

    /// Ask the model to rank `knowledge_base` against `query`. Never fails: a
    /// failed completion becomes a single [`KnowledgeMatch::search_error`].
    pub async fn search_knowledge(
        &self,
        query: &str,
        knowledge_base: &[KnowledgeEntry],
    ) -> Vec<KnowledgeMatch> {
        let prompt = knowledge_prompt(query, knowledge_base);
        match self.client.complete_text(&prompt).await {
            Ok(raw) => rank_matches(&raw),
            Err(e) => {
                error!(error = %e, "knowledge search completion failed");
                vec![KnowledgeMatch::search_error(&e)]
            }
        }
    }
}
