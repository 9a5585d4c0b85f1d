// src/rate_limit.rs
//! Per-client, per-route fixed-window request limits.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use metrics::counter;
use tracing::warn;

use crate::error::ApiError;

pub const WINDOW: Duration = Duration::from_secs(60);

/// Windows are pruned once the table holds this many keys.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteLimit {
    /// HTML pages.
    Page,
    Chat,
    AnalyzePost,
    ApiSearch,
}

impl RouteLimit {
    pub fn per_minute(self) -> u32 {
        match self {
            RouteLimit::Page => 100,
            RouteLimit::Chat | RouteLimit::AnalyzePost => 30,
            RouteLimit::ApiSearch => 50,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(RouteLimit, String), Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, route: RouteLimit, client: &str) -> Result<(), ApiError> {
        self.check_at(route, client, Instant::now())
    }

    /// Count one request from `client` on `route` at `now`; the request past
    /// the route's per-minute budget is rejected until the window rolls over.
    pub fn check_at(&self, route: RouteLimit, client: &str, now: Instant) -> Result<(), ApiError> {
        let limit = route.per_minute();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now.saturating_duration_since(w.started) < WINDOW);
        }

        let w = windows
            .entry((route, client.to_string()))
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.saturating_duration_since(w.started) >= WINDOW {
            *w = Window {
                started: now,
                count: 0,
            };
        }
        if w.count >= limit {
            warn!(client, ?route, limit, "rate limit exceeded");
            counter!("http_rate_limited_total").increment(1);
            return Err(ApiError::RateLimited { per_minute: limit });
        }
        w.count += 1;
        Ok(())
    }
}

/// Best-effort client address: first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer, else `"unknown"`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty())
    };
    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);
        Ok(ClientAddr(client_key(&parts.headers, peer)))
    }
}
