// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod metrics;
pub mod pages;
pub mod post;
pub mod rate_limit;
pub mod search;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::compression::{predicate::SizeAbove, CompressionLayer};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;

use crate::knowledge::providers::ListingProvider;
use crate::knowledge::{KnowledgeBase, KnowledgeProvider, KnowledgeStore};
use crate::llm::{CompletionClient, DynProvider, ModelProfile, OpenRouterProvider, TextAnalyzer};
use crate::post::{GraphApiSource, PostAnalyzer, PostSource};
use crate::rate_limit::RateLimiter;
use crate::search::SearchService;

/// Responses smaller than this are sent uncompressed.
pub const GZIP_MIN_BYTES: u16 = 1000;

/// The outward-facing collaborators of the service. Production wiring uses
/// [`Backends::from_config`]; tests substitute scripted ones.
pub struct Backends {
    pub llm: DynProvider,
    pub posts: Arc<dyn PostSource>,
    pub knowledge: Vec<Box<dyn KnowledgeProvider>>,
}

impl Backends {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let llm = OpenRouterProvider::new(&cfg.llm, &cfg.api_key)
            .context("building OpenRouter client")?;
        let posts = GraphApiSource::new(&cfg.graph, cfg.fb_access_token.clone())?;
        let knowledge = ListingProvider::defaults(
            &cfg.knowledge.news_url,
            &cfg.knowledge.docs_url,
            Duration::from_secs(cfg.knowledge.scrape_timeout_secs),
        )?;
        Ok(Self {
            llm: Arc::new(llm),
            posts: Arc::new(posts),
            knowledge,
        })
    }
}

/// Construct every component once and bundle them for axum `State`.
pub fn build_state(cfg: &AppConfig, backends: Backends) -> AppState {
    let chat = Arc::new(CompletionClient::new(
        backends.llm.clone(),
        ModelProfile::chat(&cfg.llm.chat_model),
    ));
    let analyzer = Arc::new(TextAnalyzer::new(CompletionClient::new(
        backends.llm,
        ModelProfile::analysis(&cfg.llm.analysis_model),
    )));

    let store = KnowledgeStore::new(&cfg.knowledge.data_path, &cfg.knowledge.last_update_path);
    let knowledge = Arc::new(KnowledgeBase::new(
        store,
        backends.knowledge,
        Duration::from_secs(cfg.knowledge.refresh_interval_hours.saturating_mul(3600)),
    ));

    AppState {
        chat,
        posts: Arc::new(PostAnalyzer::new(analyzer.clone(), backends.posts)),
        search: Arc::new(SearchService::new(knowledge, analyzer)),
        limiter: Arc::new(RateLimiter::new()),
        app_name: Arc::from(cfg.llm.app_title.as_str()),
    }
}

/// Routes plus the CORS, compression and static-file layers.
pub fn app_with_state(cfg: &AppConfig, state: AppState) -> anyhow::Result<Router> {
    let origins = cfg
        .allowed_origins
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()
        .context("invalid allowed origin")?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION]);

    Ok(router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(CompressionLayer::new().compress_when(SizeAbove::new(GZIP_MIN_BYTES)))
        .layer(cors))
}

/// Production router: real backends from `cfg`.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let backends = Backends::from_config(cfg)?;
    let state = build_state(cfg, backends);
    info!(
        chat_model = %cfg.llm.chat_model,
        analysis_model = %cfg.llm.analysis_model,
        origins = ?cfg.allowed_origins,
        "application state ready"
    );
    app_with_state(cfg, state)
}
