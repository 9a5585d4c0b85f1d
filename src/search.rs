// src/search.rs
use std::sync::Arc;

use metrics::counter;
use tracing::{error, info};

use crate::error::LlmError;
use crate::knowledge::KnowledgeBase;
use crate::llm::{KnowledgeMatch, TextAnalyzer};

pub const SEARCH_APOLOGY: &str = "Sorry, an error occurred while searching";

/// Refresh-then-search over the knowledge base, returning display blocks.
pub struct SearchService {
    knowledge: Arc<KnowledgeBase>,
    analyzer: Arc<TextAnalyzer>,
}

impl SearchService {
    pub fn new(knowledge: Arc<KnowledgeBase>, analyzer: Arc<TextAnalyzer>) -> Self {
        Self {
            knowledge,
            analyzer,
        }
    }

    /// One formatted block per ranked match. Any failure yields a single
    /// [`SEARCH_APOLOGY`] entry instead.
    pub async fn search(&self, query: &str) -> Vec<String> {
        match self.ranked_matches(query).await {
            Ok(matches) => {
                info!(results = matches.len(), "search finished");
                matches.iter().map(format_match).collect()
            }
            Err(e) => {
                error!(error = %e, "search failed");
                counter!("search_fallbacks_total").increment(1);
                vec![SEARCH_APOLOGY.to_string()]
            }
        }
    }

    /// Ranked matches, each enriched with a general analysis of its text.
    pub async fn ranked_matches(&self, query: &str) -> Result<Vec<KnowledgeMatch>, LlmError> {
        self.knowledge.refresh_if_stale().await;
        let entries = self.knowledge.load();
        let mut matches = self.analyzer.search_knowledge(query, &entries).await;
        for m in matches.iter_mut() {
            let analysis = self.analyzer.analyze_general(&m.text).await?;
            m.enrich(analysis);
        }
        Ok(matches)
    }
}

pub fn format_match(m: &KnowledgeMatch) -> String {
    format!(
        "{}\n\nRelevance: {}\nExplanation: {}\nSentiment: {}\nKey points: {}\n\nSource: {}",
        m.text,
        m.relevance,
        m.explanation,
        m.sentiment,
        m.key_points.join(", "),
        m.source
    )
}
