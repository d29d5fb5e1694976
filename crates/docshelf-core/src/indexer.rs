//! Asynchronous full-text index population.
//!
//! The indexer fetches every internal item's content and stores it
//! lowercased in an in-memory map keyed by asset path. The map may be
//! partially populated at any time; consumers treat a missing entry as "not
//! yet indexed", never as an error.
//!
//! ## Generations
//!
//! At most one indexing run is active at a time. Each run captures a
//! generation number; starting a new run advances the generation, which
//! cancels the previous run cooperatively: its in-flight fetches may still
//! complete, but any write from a superseded generation is dropped before it
//! reaches the shared map. This discipline substitutes for a lock on the
//! single-writer/many-reader store.
//!
//! Every per-item completion, success or failure, counts toward a finished
//! tally; the `is_indexing` flag flips false exactly when the tally reaches
//! the item count, so one broken page cannot wedge completion detection.

use crate::fetcher::PageFetcher;
use crate::types::Sitemap;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared search index state: the entry map plus run bookkeeping.
///
/// Readers go through [`IndexStore::lookup`]; the single writer role per
/// generation goes through the indexer. Lock poisoning is recovered rather
/// than propagated since entries are plain strings and always consistent.
#[derive(Debug, Default)]
pub struct IndexStore {
    entries: RwLock<HashMap<String, String>>,
    generation: AtomicU64,
    indexing: AtomicBool,
}

impl IndexStore {
    /// Returns the lowercased content for an asset path, if indexed yet.
    #[must_use]
    pub fn lookup(&self, asset_path: &str) -> Option<String> {
        self.read_entries().get(asset_path).cloned()
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// True while an indexing run is in flight.
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::SeqCst)
    }

    /// A copy of the whole entry map, mainly for artifact writing and tests.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.read_entries().clone()
    }

    /// Current indexing generation.
    #[must_use]
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Writes one entry, unless `generation` has been superseded. Returns
    /// whether the write was committed.
    pub fn write_entry(&self, generation: u64, asset_path: &str, content: String) -> bool {
        if self.current_generation() != generation {
            debug!("Dropping superseded index write for '{asset_path}'");
            return false;
        }
        self.write_entries()
            .insert(asset_path.to_string(), content);
        true
    }

    /// Bulk-inserts entries (artifact seeding).
    pub fn seed<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = self.write_entries();
        for (path, content) in entries {
            map.insert(path, content);
        }
    }

    fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn set_indexing(&self, value: bool) {
        self.indexing.store(value, Ordering::SeqCst);
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Drives indexing runs over a sitemap with bounded fetch parallelism.
pub struct SearchIndexer {
    fetcher: Arc<PageFetcher>,
    store: Arc<IndexStore>,
    concurrency: usize,
}

impl SearchIndexer {
    /// Creates an indexer with the given worker budget (at least 1).
    #[must_use]
    pub fn new(fetcher: Arc<PageFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            store: Arc::new(IndexStore::default()),
            concurrency: concurrency.max(1),
        }
    }

    /// The shared store this indexer writes into.
    #[must_use]
    pub fn store(&self) -> Arc<IndexStore> {
        Arc::clone(&self.store)
    }

    /// Starts an indexing run for the sitemap's internal items.
    ///
    /// A duplicate start while a run is in flight is a no-op and returns
    /// `None` (single-flight); a sitemap with no internal items also returns
    /// `None`. Otherwise the spawned run's handle is returned.
    pub fn start(&self, sitemap: &Sitemap) -> Option<JoinHandle<()>> {
        if self.store.is_indexing() {
            debug!("Indexing already in progress, ignoring duplicate start");
            return None;
        }
        self.spawn_run(sitemap)
    }

    /// Cancels any in-flight run and starts a fresh one.
    ///
    /// Entries already written stay in place until the new run overwrites
    /// them; remaining work of the old run is dropped.
    pub fn restart(&self, sitemap: &Sitemap) -> Option<JoinHandle<()>> {
        self.spawn_run(sitemap)
    }

    /// Cancels any in-flight run without starting a new one.
    pub fn cancel(&self) {
        self.store.advance_generation();
        self.store.set_indexing(false);
    }

    fn spawn_run(&self, sitemap: &Sitemap) -> Option<JoinHandle<()>> {
        let paths: Vec<String> = sitemap
            .internal_items()
            .filter_map(|item| item.asset_path.clone())
            .collect();
        if paths.is_empty() {
            return None;
        }

        // Advancing the generation is what cancels a previous run; writes
        // and completion accounting both check it.
        let generation = self.store.advance_generation();
        self.store.set_indexing(true);

        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let concurrency = self.concurrency;

        Some(tokio::spawn(async move {
            run_generation(&fetcher, &store, paths, generation, concurrency).await;
        }))
    }
}

async fn run_generation(
    fetcher: &PageFetcher,
    store: &IndexStore,
    paths: Vec<String>,
    generation: u64,
    concurrency: usize,
) {
    let total = paths.len();
    info!("Indexing {total} pages (generation {generation})");

    let mut fetches = futures::stream::iter(paths.into_iter().map(|path| async move {
        let result = fetcher.fetch_page(&path).await;
        (path, result)
    }))
    .buffer_unordered(concurrency);

    let mut finished = 0usize;
    while let Some((path, result)) = fetches.next().await {
        if store.current_generation() != generation {
            debug!("Indexing generation {generation} superseded, stopping");
            return;
        }

        match result {
            Ok(content) => {
                store.write_entry(generation, &path, content.to_lowercase());
            },
            Err(err) => {
                // A failed page stays absent from the index but still counts
                // toward completion
                warn!("Indexing fetch failed for '{path}': {err}");
            },
        }
        finished += 1;
    }

    if finished == total && store.current_generation() == generation {
        store.set_indexing(false);
        info!("Indexing complete: {} entries", store.len());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, SourceConfig, SourceMode};
    use crate::types::{DocItem, DocSection};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sitemap_of(paths: &[&str]) -> Sitemap {
        Sitemap {
            sections: vec![DocSection {
                title: "S".to_string(),
                icon: "folder".to_string(),
                description: String::new(),
                items: paths
                    .iter()
                    .map(|p| DocItem::internal(format!("Item {p}"), (*p).to_string()))
                    .collect(),
            }],
            quick_links: Vec::new(),
        }
    }

    fn remote_fetcher(base: &str) -> Arc<PageFetcher> {
        let source = SourceConfig {
            mode: SourceMode::Remote,
            repo: "acme/site".to_string(),
            branch: "main".to_string(),
            path_prefix: "docs".to_string(),
            ..SourceConfig::default()
        };
        Arc::new(
            PageFetcher::new(source, &FetchConfig::default())
                .unwrap()
                .with_raw_base(base),
        )
    }

    async fn mount_page(server: &MockServer, name: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/acme/site/main/docs/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_indexes_all_pages_lowercased() {
        let server = MockServer::start().await;
        mount_page(&server, "a.md", "# Alpha CONTENT").await;
        mount_page(&server, "b.md", "# Beta").await;

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 4);
        let handle = indexer.start(&sitemap_of(&["a.md", "b.md"])).unwrap();
        handle.await.unwrap();

        let store = indexer.store();
        assert!(!store.is_indexing());
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("a.md").unwrap(), "# alpha content");
        assert_eq!(store.lookup("b.md").unwrap(), "# beta");
    }

    #[tokio::test]
    async fn test_failed_page_counts_toward_completion() {
        let server = MockServer::start().await;
        mount_page(&server, "ok.md", "fine").await;
        // missing.md is not mounted: 404

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 4);
        let handle = indexer.start(&sitemap_of(&["ok.md", "missing.md"])).unwrap();
        handle.await.unwrap();

        let store = indexer.store();
        assert!(!store.is_indexing(), "failure must not wedge completion");
        assert_eq!(store.len(), 1);
        assert!(store.lookup("missing.md").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_start_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 2);
        let sitemap = sitemap_of(&["a.md", "b.md"]);

        let first = indexer.start(&sitemap);
        assert!(first.is_some());
        assert!(indexer.store().is_indexing());

        let second = indexer.start(&sitemap);
        assert!(second.is_none(), "single-flight start");

        first.unwrap().await.unwrap();
        assert!(!indexer.store().is_indexing());
    }

    #[tokio::test]
    async fn test_restart_supersedes_previous_run() {
        let server = MockServer::start().await;
        mount_page(&server, "a.md", "Payload").await;
        mount_page(&server, "b.md", "Payload").await;
        mount_page(&server, "c.md", "Payload").await;

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 4);
        let sitemap = sitemap_of(&["a.md", "b.md", "c.md"]);

        // Run A is spawned but its writes are superseded before it is polled
        let run_a = indexer.start(&sitemap).unwrap();
        let run_b = indexer.restart(&sitemap).unwrap();

        run_a.await.unwrap();
        run_b.await.unwrap();

        let store = indexer.store();
        assert!(!store.is_indexing());
        assert_eq!(store.len(), 3);
        for key in ["a.md", "b.md", "c.md"] {
            assert_eq!(store.lookup(key).unwrap(), "payload");
        }
    }

    #[test]
    fn test_superseded_write_is_dropped() {
        let store = IndexStore::default();
        let stale = store.advance_generation();
        let current = store.advance_generation();

        assert!(!store.write_entry(stale, "a.md", "old".to_string()));
        assert!(store.lookup("a.md").is_none());

        assert!(store.write_entry(current, "a.md", "new".to_string()));
        assert_eq!(store.lookup("a.md").unwrap(), "new");
    }

    #[tokio::test]
    async fn test_reindexing_is_idempotent() {
        let server = MockServer::start().await;
        mount_page(&server, "a.md", "Stable Content").await;
        mount_page(&server, "b.md", "More Content").await;

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 4);
        let sitemap = sitemap_of(&["a.md", "b.md"]);

        indexer.start(&sitemap).unwrap().await.unwrap();
        let first = indexer.store().snapshot();

        indexer.restart(&sitemap).unwrap().await.unwrap();
        let second = indexer.store().snapshot();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_sitemap_does_not_start() {
        let server = MockServer::start().await;
        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 4);

        assert!(indexer.start(&Sitemap::default()).is_none());
        assert!(!indexer.store().is_indexing());
    }

    #[tokio::test]
    async fn test_cancel_clears_indexing_flag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(Duration::from_millis(100)),
            )
            .mount(&server)
            .await;

        let indexer = SearchIndexer::new(remote_fetcher(&server.uri()), 1);
        let handle = indexer.start(&sitemap_of(&["a.md"])).unwrap();
        indexer.cancel();
        assert!(!indexer.store().is_indexing());

        handle.await.unwrap();
        // The cancelled run wrote nothing
        assert!(indexer.store().is_empty());
    }

    #[test]
    fn test_seed_bulk_inserts() {
        let store = IndexStore::default();
        store.seed(HashMap::from([
            ("a.md".to_string(), "alpha".to_string()),
            ("b.md".to_string(), "beta".to_string()),
        ]));
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("b.md").unwrap(), "beta");
    }
}
