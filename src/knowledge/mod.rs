// src/knowledge/mod.rs
pub mod providers;
pub mod store;
pub mod types;

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{error, info, warn};

use crate::metrics::ensure_described;
pub use store::KnowledgeStore;
pub use types::{KnowledgeEntry, KnowledgeProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The marker is younger than the refresh interval.
    Skipped { last_update: DateTime<Utc> },
    Refreshed { fetched: usize, added: usize },
}

/// Append the entries of `incoming` whose id is not in `existing` yet.
/// Duplicates inside `incoming` are kept once. Returns how many were added.
pub fn merge_new(existing: &mut Vec<KnowledgeEntry>, incoming: Vec<KnowledgeEntry>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|e| e.id.clone()).collect();
    let before = existing.len();
    for entry in incoming {
        if seen.insert(entry.id.clone()) {
            existing.push(entry);
        }
    }
    existing.len() - before
}

/// Persistent knowledge base plus the scrapers that keep it current.
pub struct KnowledgeBase {
    store: KnowledgeStore,
    providers: Vec<Box<dyn KnowledgeProvider>>,
    interval: Duration,
}

impl KnowledgeBase {
    pub fn new(
        store: KnowledgeStore,
        providers: Vec<Box<dyn KnowledgeProvider>>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            providers,
            interval,
        }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    pub fn load(&self) -> Vec<KnowledgeEntry> {
        self.store.load()
    }

    pub async fn refresh_if_stale(&self) -> RefreshOutcome {
        self.refresh_if_stale_at(Utc::now()).await
    }

    /// Scrape every provider and append unseen entries, unless the last
    /// refresh happened less than `interval` before `now`. Never fails:
    /// provider and persistence errors are logged and counted.
    pub async fn refresh_if_stale_at(&self, now: DateTime<Utc>) -> RefreshOutcome {
        ensure_described();

        let last_update = self.store.last_update();
        let stale = matches!(
            now.signed_duration_since(last_update).to_std(),
            Ok(elapsed) if elapsed >= self.interval
        );
        if !stale {
            info!(%last_update, "knowledge base is fresh, skipping refresh");
            counter!("kb_refresh_skipped_total").increment(1);
            return RefreshOutcome::Skipped { last_update };
        }

        counter!("kb_refresh_runs_total").increment(1);
        let mut incoming = Vec::new();
        for p in &self.providers {
            match p.fetch_latest().await {
                Ok(mut v) => {
                    if v.is_empty() {
                        warn!(provider = p.name(), "provider returned no entries");
                    }
                    incoming.append(&mut v);
                }
                Err(e) => {
                    warn!(error = ?e, provider = p.name(), "provider error");
                    counter!("kb_provider_errors_total").increment(1);
                }
            }
        }
        let fetched = incoming.len();

        let mut entries = self.store.load();
        let added = merge_new(&mut entries, incoming);
        counter!("kb_entries_added_total").increment(added as u64);

        match self.store.save(&entries) {
            Ok(()) => {
                if let Err(e) = self.store.mark_updated_at(now) {
                    error!(error = %e, "writing last update marker");
                }
            }
            Err(e) => error!(error = %e, "saving knowledge base"),
        }

        info!(fetched, added, total = entries.len(), "knowledge base refreshed");
        RefreshOutcome::Refreshed { fetched, added }
    }
}
