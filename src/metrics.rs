use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics with help text).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("llm_requests_total", Unit::Count, "Completion attempts sent upstream.");
        describe_counter!("llm_retries_total", Unit::Count, "Completion attempts repeated after a transient failure.");
        describe_counter!("llm_failures_total", Unit::Count, "Completions that failed after all attempts.");
        describe_counter!("kb_refresh_runs_total", Unit::Count, "Knowledge base refresh cycles that fetched sources.");
        describe_counter!("kb_refresh_skipped_total", Unit::Count, "Refresh calls skipped because the marker is fresh.");
        describe_counter!("kb_entries_added_total", Unit::Count, "Knowledge entries appended by refreshes.");
        describe_counter!("kb_provider_errors_total", Unit::Count, "Listing fetch/parse failures.");
        describe_counter!("search_fallbacks_total", Unit::Count, "Searches answered with the apology placeholder.");
        describe_counter!("http_rate_limited_total", Unit::Count, "Requests rejected by the per-route limiter.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Only one recorder may exist per
    /// process, so the binary calls this once at startup.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
