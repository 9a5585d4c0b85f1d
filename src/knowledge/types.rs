// src/knowledge/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    #[serde(default)]
    pub id: String, // hex sha256 of the title
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: String, // e.g. "Facebook Newsroom"
    #[serde(default)]
    pub category: String, // "news" | "documentation"
    #[serde(default)]
    pub date: String, // free text as scraped, never parsed
}

impl KnowledgeEntry {
    pub fn new(title: &str, content: &str, source: &str, category: &str, date: &str) -> Self {
        let title = title.trim();
        Self {
            id: entry_id(title),
            title: title.to_string(),
            content: content.trim().to_string(),
            source: source.to_string(),
            category: category.to_string(),
            date: date.trim().to_string(),
        }
    }
}

/// Stable id for a knowledge entry: hex SHA-256 of the trimmed title.
pub fn entry_id(title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait::async_trait]
pub trait KnowledgeProvider: Send + Sync {
    /// Fetch and parse the current listing. An empty listing is `Ok(vec![])`.
    async fn fetch_latest(&self) -> Result<Vec<KnowledgeEntry>>;
    fn name(&self) -> &'static str;
}
