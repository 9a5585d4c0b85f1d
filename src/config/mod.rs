// src/config/mod.rs
//! Service configuration: an optional TOML file for tunables, the process
//! environment for credentials and CORS origins.

pub mod llm;

use anyhow::{anyhow, bail, Context, Result};
use axum::http::HeaderValue;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use llm::LlmSettings;

pub const DEFAULT_CONFIG_PATH: &str = "config/service.toml";
pub const ENV_CONFIG_PATH: &str = "SERVICE_CONFIG_PATH";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_FB_ACCESS_TOKEN: &str = "FB_ACCESS_TOKEN";
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";

pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:8000";

fn default_data_path() -> PathBuf {
    PathBuf::from("data/knowledge_base.json")
}
fn default_last_update_path() -> PathBuf {
    PathBuf::from("data/last_update.json")
}
fn default_refresh_interval_hours() -> u64 {
    24
}
fn default_news_url() -> String {
    "https://newsroom.fb.com/news/".to_string()
}
fn default_docs_url() -> String {
    "https://developers.facebook.com/docs/".to_string()
}
fn default_scrape_timeout_secs() -> u64 {
    20
}
fn default_graph_base_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}
fn default_graph_timeout_secs() -> u64 {
    15
}

/// `[knowledge]` table: where the knowledge base lives and how it is refreshed.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeSettings {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_last_update_path")]
    pub last_update_path: PathBuf,
    #[serde(default = "default_refresh_interval_hours")]
    pub refresh_interval_hours: u64,
    #[serde(default = "default_news_url")]
    pub news_url: String,
    #[serde(default = "default_docs_url")]
    pub docs_url: String,
    #[serde(default = "default_scrape_timeout_secs")]
    pub scrape_timeout_secs: u64,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            last_update_path: default_last_update_path(),
            refresh_interval_hours: default_refresh_interval_hours(),
            news_url: default_news_url(),
            docs_url: default_docs_url(),
            scrape_timeout_secs: default_scrape_timeout_secs(),
        }
    }
}

/// `[graph]` table: Facebook Graph API access for post lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphSettings {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_graph_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            timeout_secs: default_graph_timeout_secs(),
        }
    }
}

/// On-disk shape of `config/service.toml`. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub knowledge: KnowledgeSettings,
    #[serde(default)]
    pub graph: GraphSettings,
}

#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub fb_access_token: Option<String>,
    pub allowed_origins: Vec<String>,
    pub llm: LlmSettings,
    pub knowledge: KnowledgeSettings,
    pub graph: GraphSettings,
}

// Never print credentials; key lengths are enough for diagnostics.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key_len", &self.api_key.len())
            .field("fb_access_token", &self.fb_access_token.is_some())
            .field("allowed_origins", &self.allowed_origins)
            .field("llm", &self.llm)
            .field("knowledge", &self.knowledge)
            .field("graph", &self.graph)
            .finish()
    }
}

impl AppConfig {
    /// Load using the process environment:
    /// 1) TOML from $SERVICE_CONFIG_PATH (must exist when set)
    /// 2) else `config/service.toml` when present
    /// 3) else built-in defaults
    pub fn load() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
                }
                load_file_config(&pb)?
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    load_file_config(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::from_parts(file, |k| std::env::var(k).ok())
    }

    /// Combine file settings with an environment lookup. Fails when the
    /// OpenRouter key is missing or an origin is not a valid header value.
    pub fn from_parts<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = env(ENV_API_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow!("{ENV_API_KEY} is required"))?;

        let fb_access_token = env(ENV_FB_ACCESS_TOKEN)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let allowed_origins =
            parse_origins(env(ENV_ALLOWED_ORIGINS).as_deref().unwrap_or(DEFAULT_ALLOWED_ORIGIN))?;

        let mut llm = file.llm;
        llm.sanitize();

        let mut knowledge = file.knowledge;
        if knowledge.refresh_interval_hours == 0 {
            knowledge.refresh_interval_hours = default_refresh_interval_hours();
        }

        Ok(Self {
            api_key,
            fb_access_token,
            allowed_origins,
            llm,
            knowledge,
            graph: file.graph,
        })
    }
}

pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading service config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing service config {}", path.display()))
}

fn parse_origins(raw: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for o in raw.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        HeaderValue::from_str(o).with_context(|| format!("invalid origin in {ENV_ALLOWED_ORIGINS}: {o}"))?;
        if !out.iter().any(|x: &String| x == o) {
            out.push(o.to_string());
        }
    }
    if out.is_empty() {
        out.push(DEFAULT_ALLOWED_ORIGIN.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let err = AppConfig::from_parts(FileConfig::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains(ENV_API_KEY));

        let blank = AppConfig::from_parts(FileConfig::default(), env_of(&[(ENV_API_KEY, "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn defaults_apply_without_file() {
        let cfg = AppConfig::from_parts(FileConfig::default(), env_of(&[(ENV_API_KEY, "sk-test")]))
            .unwrap();
        assert_eq!(cfg.allowed_origins, vec![DEFAULT_ALLOWED_ORIGIN.to_string()]);
        assert!(cfg.fb_access_token.is_none());
        assert_eq!(cfg.knowledge.refresh_interval_hours, 24);
        assert_eq!(cfg.llm.max_retries, 3);
        assert!(!format!("{cfg:?}").contains("sk-test"));
    }

    #[test]
    fn origins_are_split_and_deduped() {
        let cfg = AppConfig::from_parts(
            FileConfig::default(),
            env_of(&[
                (ENV_API_KEY, "k"),
                (ENV_ALLOWED_ORIGINS, "https://a.example, https://b.example,https://a.example"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn toml_file_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("service.toml");
        fs::write(
            &p,
            r#"
[llm]
chat_model = "openai/gpt-4o-mini"
max_retries = 5

[knowledge]
data_path = "/tmp/kb.json"
refresh_interval_hours = 6
"#,
        )
        .unwrap();
        let file = load_file_config(&p).unwrap();
        let cfg = AppConfig::from_parts(file, env_of(&[(ENV_API_KEY, "k")])).unwrap();
        assert_eq!(cfg.llm.chat_model, "openai/gpt-4o-mini");
        assert_eq!(cfg.llm.max_retries, 5);
        assert_eq!(cfg.llm.analysis_model, "deepseek/deepseek-r1-zero:free");
        assert_eq!(cfg.knowledge.data_path, PathBuf::from("/tmp/kb.json"));
        assert_eq!(cfg.knowledge.refresh_interval_hours, 6);
        assert_eq!(cfg.graph.base_url, "https://graph.facebook.com/v18.0");
    }

    #[test]
    fn shipped_example_matches_defaults() {
        let file = load_file_config(Path::new("config/service.example.toml")).unwrap();
        assert_eq!(file.llm.chat_model, LlmSettings::default().chat_model);
        assert_eq!(file.llm.retry_backoff_ms, LlmSettings::default().retry_backoff_ms);
        assert_eq!(file.knowledge.data_path, default_data_path());
        assert_eq!(file.knowledge.docs_url, default_docs_url());
        assert_eq!(file.graph.timeout_secs, default_graph_timeout_secs());
    }
}
