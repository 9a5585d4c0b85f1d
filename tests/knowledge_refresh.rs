// tests/knowledge_refresh.rs
//
// KnowledgeBase refresh gating and append-only dedup, with in-process
// providers and a temp data directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use fb_rag_chatbot::knowledge::providers::{ListingLayout, ListingProvider};
use fb_rag_chatbot::knowledge::{
    KnowledgeBase, KnowledgeEntry, KnowledgeProvider, KnowledgeStore, RefreshOutcome,
};

const DAY: Duration = Duration::from_secs(24 * 3600);

struct CountingProvider {
    calls: Arc<AtomicUsize>,
    titles: Vec<&'static str>,
}

#[async_trait]
impl KnowledgeProvider for CountingProvider {
    async fn fetch_latest(&self) -> Result<Vec<KnowledgeEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .titles
            .iter()
            .map(|t| KnowledgeEntry::new(t, "body", "Test", "news", "2024-01-01"))
            .collect())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

struct FailingProvider;

#[async_trait]
impl KnowledgeProvider for FailingProvider {
    async fn fetch_latest(&self) -> Result<Vec<KnowledgeEntry>> {
        bail!("listing returned 503")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn store_in(dir: &tempfile::TempDir) -> KnowledgeStore {
    KnowledgeStore::new(
        dir.path().join("data/knowledge_base.json"),
        dir.path().join("data/last_update.json"),
    )
}

#[tokio::test]
async fn second_refresh_within_interval_fetches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let kb = KnowledgeBase::new(
        store_in(&dir),
        vec![Box::new(CountingProvider {
            calls: calls.clone(),
            titles: vec!["A", "B"],
        })],
        DAY,
    );

    let first = kb.refresh_if_stale().await;
    assert_eq!(first, RefreshOutcome::Refreshed { fetched: 2, added: 2 });
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let second = kb.refresh_if_stale().await;
    assert!(matches!(second, RefreshOutcome::Skipped { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(kb.load().len(), 2);
}

#[tokio::test]
async fn stale_marker_refreshes_and_dedups_against_existing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store
        .save(&[KnowledgeEntry::new("A", "old", "Test", "news", "")])
        .unwrap();
    store
        .mark_updated_at(Utc::now() - ChronoDuration::hours(25))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let kb = KnowledgeBase::new(
        store,
        vec![Box::new(CountingProvider {
            calls: calls.clone(),
            titles: vec!["A", "B", "B", "C"],
        })],
        DAY,
    );

    let out = kb.refresh_if_stale().await;
    assert_eq!(out, RefreshOutcome::Refreshed { fetched: 4, added: 2 });

    let entries = kb.load();
    let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
    // existing entries are never rewritten
    assert_eq!(entries[0].content, "old");

    let marker = kb.store().last_update();
    assert!(Utc::now() - marker < ChronoDuration::minutes(1));
}

#[tokio::test]
async fn refresh_gate_uses_the_given_clock() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let kb = KnowledgeBase::new(
        store_in(&dir),
        vec![Box::new(CountingProvider {
            calls: calls.clone(),
            titles: vec!["A"],
        })],
        DAY,
    );
    let t0 = Utc::now();

    kb.refresh_if_stale_at(t0).await;
    let skipped = kb.refresh_if_stale_at(t0 + ChronoDuration::hours(23)).await;
    assert!(matches!(skipped, RefreshOutcome::Skipped { .. }));
    let refreshed = kb.refresh_if_stale_at(t0 + ChronoDuration::hours(24)).await;
    assert_eq!(refreshed, RefreshOutcome::Refreshed { fetched: 1, added: 0 });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failing_provider_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let kb = KnowledgeBase::new(
        store_in(&dir),
        vec![
            Box::new(FailingProvider),
            Box::new(ListingProvider::from_fixture(
                ListingLayout::docs(),
                r#"<div class="documentation-item"><h3>Graph API</h3><p class="description">Read the graph.</p></div>"#,
            )),
        ],
        DAY,
    );

    let out = kb.refresh_if_stale().await;
    assert_eq!(out, RefreshOutcome::Refreshed { fetched: 1, added: 1 });
    let entries = kb.load();
    assert_eq!(entries[0].title, "Graph API");
    assert_eq!(entries[0].source, "Facebook Documentation");
}

#[tokio::test]
async fn all_providers_failing_still_marks_the_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let kb = KnowledgeBase::new(store_in(&dir), vec![Box::new(FailingProvider)], DAY);

    let out = kb.refresh_if_stale().await;
    assert_eq!(out, RefreshOutcome::Refreshed { fetched: 0, added: 0 });
    assert!(kb.load().is_empty());
    assert!(matches!(
        kb.refresh_if_stale().await,
        RefreshOutcome::Skipped { .. }
    ));
}

#[tokio::test]
async fn description_less_listing_does_not_block_later_full_entry() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = Utc::now();

    let bare = KnowledgeBase::new(
        store_in(&dir),
        vec![Box::new(ListingProvider::from_fixture(
            ListingLayout::docs(),
            r#"<li class="documentation-item"><h3>Graph API</h3></li>"#,
        ))],
        DAY,
    );
    let first = bare.refresh_if_stale_at(t0).await;
    assert_eq!(first, RefreshOutcome::Refreshed { fetched: 0, added: 0 });

    let full = KnowledgeBase::new(
        store_in(&dir),
        vec![Box::new(ListingProvider::from_fixture(
            ListingLayout::docs(),
            r#"<li class="documentation-item"><h3>Graph API</h3><p class="description">Read the social graph.</p></li>"#,
        ))],
        DAY,
    );
    let second = full.refresh_if_stale_at(t0 + ChronoDuration::hours(25)).await;
    assert_eq!(second, RefreshOutcome::Refreshed { fetched: 1, added: 1 });

    let stored = full.load();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Graph API");
    assert_eq!(stored[0].content, "Read the social graph.");
}
