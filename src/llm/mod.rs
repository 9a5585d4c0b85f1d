// src/llm/mod.rs
pub mod analysis;
pub mod completion;
pub mod provider;

pub use analysis::{AnalysisMode, GeneralAnalysis, KnowledgeMatch, SentimentAnalysis, TextAnalyzer};
pub use completion::{Completion, CompletionClient};
pub use provider::{ChatProvider, DynProvider, ModelProfile, OpenRouterProvider, ScriptedProvider};
