// src/post.rs
//! Facebook post analysis: resolve the post text (inline or via the Graph
//! API) and merge a general and a sentiment analysis of it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GraphSettings;
use crate::error::{Result, ServiceError};
use crate::llm::TextAnalyzer;
use crate::text::{extract_hashtags, extract_mentions, truncate_chars};

/// Post id from `.../posts/<id>` or `.../permalink/<id>`, with any query
/// string, fragment or trailing path removed.
pub fn extract_post_id(url: &str) -> Option<&str> {
    let rest = ["/posts/", "/permalink/"]
        .iter()
        .find_map(|marker| url.split_once(marker).map(|(_, rest)| rest))?;
    let id = rest.split(['?', '#', '/']).next().unwrap_or("").trim();
    (!id.is_empty()).then_some(id)
}

#[async_trait]
pub trait PostSource: Send + Sync {
    /// Message text of the post. `Ok(None)` when the post has no message or
    /// the source cannot be queried.
    async fn fetch_message(&self, post_id: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Deserialize)]
struct GraphPost {
    #[serde(default)]
    message: Option<String>,
}

/// Graph API lookup (`GET {base}/{id}?fields=message,description,created_time`).
pub struct GraphApiSource {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl GraphApiSource {
    pub fn new(settings: &GraphSettings, access_token: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("building graph api client")?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl PostSource for GraphApiSource {
    async fn fetch_message(&self, post_id: &str) -> anyhow::Result<Option<String>> {
        let Some(token) = self.access_token.as_deref() else {
            warn!("FB_ACCESS_TOKEN not set, cannot fetch post content");
            return Ok(None);
        };
        let url = format!("{}/{}", self.base_url, post_id);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("fields", "message,description,created_time"),
                ("access_token", token),
            ])
            .send()
            .await
            .context("graph api request")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("graph api returned {status} for post {post_id}");
        }
        let post: GraphPost = resp.json().await.context("decoding graph api response")?;
        Ok(post.message.filter(|m| !m.trim().is_empty()))
    }
}

/// Fixed post texts keyed by id, for tests and offline runs.
#[derive(Default)]
pub struct StaticPostSource {
    posts: std::collections::HashMap<String, String>,
}

impl StaticPostSource {
    pub fn with_post(mut self, id: &str, message: &str) -> Self {
        self.posts.insert(id.to_string(), message.to_string());
        self
    }
}

#[async_trait]
impl PostSource for StaticPostSource {
    async fn fetch_message(&self, post_id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.posts.get(post_id).cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAnalysis {
    pub analysis: String,
    pub sentiment: String,
    pub sentiment_intensity: f64,
    pub key_topics: Vec<String>,
    pub key_points: Vec<String>,
    pub sentiment_keywords: Vec<String>,
}

pub struct PostAnalyzer {
    analyzer: Arc<TextAnalyzer>,
    source: Arc<dyn PostSource>,
}

impl PostAnalyzer {
    pub fn new(analyzer: Arc<TextAnalyzer>, source: Arc<dyn PostSource>) -> Self {
        Self { analyzer, source }
    }

    /// Analyze `content`, or the post behind `url` when `content` is blank.
    pub async fn analyze_post(&self, url: &str, content: Option<&str>) -> Result<PostAnalysis> {
        let text = match content.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => c.to_string(),
            None => self.resolve(url).await?,
        };
        info!(
            chars = text.chars().count(),
            hashtags = ?extract_hashtags(&text),
            mentions = extract_mentions(&text).len(),
            "analyzing post"
        );

        let (general, sentiment) = tokio::try_join!(
            self.analyzer.analyze_general(&text),
            self.analyzer.analyze_sentiment(&text),
        )?;

        Ok(PostAnalysis {
            analysis: general.summary,
            sentiment: sentiment.sentiment,
            sentiment_intensity: sentiment.intensity,
            key_topics: general.topics,
            key_points: general.key_points,
            sentiment_keywords: sentiment.keywords,
        })
    }

    async fn resolve(&self, url: &str) -> Result<String> {
        let post_id = extract_post_id(url).ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "no post id in url {}",
                truncate_chars(url, 200)
            ))
        })?;
        match self.source.fetch_message(post_id).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(ServiceError::ContentUnavailable(format!(
                "post {post_id} has no readable message"
            ))),
            Err(e) => {
                warn!(error = ?e, post_id, "fetching post content failed");
                Err(ServiceError::ContentUnavailable(format!("post {post_id}: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_id_patterns() {
        assert_eq!(extract_post_id("https://fb.com/x/posts/123?ref=1"), Some("123"));
        assert_eq!(extract_post_id("https://fb.com/x/permalink/456"), Some("456"));
        assert_eq!(extract_post_id("https://fb.com/x/permalink/789/#c"), Some("789"));
        assert_eq!(extract_post_id("https://fb.com/x/photos/1"), None);
        assert_eq!(extract_post_id("https://fb.com/x/posts/"), None);
    }

    #[tokio::test]
    async fn graph_source_without_token_reads_nothing() {
        let src = GraphApiSource::new(&GraphSettings::default(), None).unwrap();
        assert!(src.fetch_message("1").await.unwrap().is_none());
    }
}
