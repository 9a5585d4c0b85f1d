// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{ApiError, ServiceError};
use crate::llm::{Completion, CompletionClient};
use crate::pages::Page;
use crate::post::{PostAnalysis, PostAnalyzer};
use crate::rate_limit::{ClientAddr, RateLimiter, RouteLimit};
use crate::search::SearchService;
use crate::text::truncate_chars;

/// Longest input echoed into request logs.
const LOG_INPUT_CHARS: usize = 80;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<CompletionClient>,
    pub posts: Arc<PostAnalyzer>,
    pub search: Arc<SearchService>,
    pub limiter: Arc<RateLimiter>,
    pub app_name: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(|| async { "ok" }))
        .route("/chat-ui", get(chat_page))
        .route("/chat", post(chat))
        .route("/analyze-post", get(analyze_page).post(analyze_post))
        .route("/search", get(search_page))
        .route("/api/search", get(api_search))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct PostAnalysisRequest {
    pub post_url: String,
    #[serde(default)]
    pub post_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<String>,
}

fn page(state: &AppState, client: &ClientAddr, page: Page) -> Result<Html<String>, ApiError> {
    state.limiter.check(RouteLimit::Page, &client.0)?;
    Ok(Html(page.render(&state.app_name)))
}

async fn home(State(state): State<AppState>, client: ClientAddr) -> Result<Response, ApiError> {
    let html = page(&state, &client, Page::Home)?;
    Ok((
        [(header::CACHE_CONTROL, "public, max-age=31536000")],
        html,
    )
        .into_response())
}

async fn chat_page(
    State(state): State<AppState>,
    client: ClientAddr,
) -> Result<Html<String>, ApiError> {
    page(&state, &client, Page::Chat)
}

async fn analyze_page(
    State(state): State<AppState>,
    client: ClientAddr,
) -> Result<Html<String>, ApiError> {
    page(&state, &client, Page::Analyze)
}

async fn search_page(
    State(state): State<AppState>,
    client: ClientAddr,
) -> Result<Html<String>, ApiError> {
    page(&state, &client, Page::Search)
}

async fn chat(
    State(state): State<AppState>,
    client: ClientAddr,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Completion>, ApiError> {
    state.limiter.check(RouteLimit::Chat, &client.0)?;
    info!(client = %client.0, question = %truncate_chars(&req.question, LOG_INPUT_CHARS), "chat request");

    match state.chat.complete(&req.question).await {
        Ok(out) => Ok(Json(out)),
        Err(e) => {
            error!(client = %client.0, error = %e, "chat failed");
            Err(ServiceError::from(e).into())
        }
    }
}

async fn analyze_post(
    State(state): State<AppState>,
    client: ClientAddr,
    Json(req): Json<PostAnalysisRequest>,
) -> Result<Json<PostAnalysis>, ApiError> {
    state.limiter.check(RouteLimit::AnalyzePost, &client.0)?;
    info!(
        client = %client.0,
        post_url = %truncate_chars(&req.post_url, LOG_INPUT_CHARS),
        inline_content = req.post_content.is_some(),
        "post analysis request"
    );

    match state
        .posts
        .analyze_post(&req.post_url, req.post_content.as_deref())
        .await
    {
        Ok(out) => Ok(Json(out)),
        Err(e) => {
            error!(client = %client.0, error = %e, "post analysis failed");
            Err(e.into())
        }
    }
}

async fn api_search(
    State(state): State<AppState>,
    client: ClientAddr,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    state.limiter.check(RouteLimit::ApiSearch, &client.0)?;
    info!(client = %client.0, query = %truncate_chars(&params.q, LOG_INPUT_CHARS), "search request");

    let results = state.search.search(&params.q).await;
    Ok(Json(SearchResponse { results }))
}
