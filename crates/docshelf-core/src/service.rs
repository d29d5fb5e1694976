//! The documentation service: one object owning the pipeline's state and
//! lifecycle.
//!
//! `DocService` ties the pieces together: it fetches and parses the sidebar
//! manifest into a shared [`Sitemap`], drives the search indexer, evaluates
//! queries, renders selected pages, and maintains the deep-link location.
//! State lives behind accessors with an explicit lifecycle (`init`,
//! `reload`, `dispose`) rather than in ambient globals.
//!
//! Selection is last-navigation-wins: every internal selection claims a
//! navigation generation before its page fetch, and a render whose
//! generation has been superseded by a newer selection is discarded instead
//! of committed. Errors inside selection degrade to a placeholder page and
//! never propagate to the caller.

use crate::artifact;
use crate::config::{Config, SourceMode};
use crate::fetcher::PageFetcher;
use crate::indexer::SearchIndexer;
use crate::manifest::parse_manifest;
use crate::nav::{Location, Navigator};
use crate::renderer::{self, ERROR_PLACEHOLDER_HTML};
use crate::search::SearchEngine;
use crate::types::{Diagnostic, DiagnosticSeverity, DocItem, Sitemap, TocEntry};
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Minimum highlight/search term length carried into a render.
const MIN_TERM_LEN: usize = 2;

/// The currently displayed page.
#[derive(Debug, Clone)]
pub struct Selection {
    pub item: DocItem,
    /// Sanitized, annotated HTML of the rendered page.
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// What a selection request produced.
#[derive(Debug, Clone)]
pub enum SelectOutcome {
    /// The page was rendered and committed as the current selection.
    Rendered(Selection),
    /// The item is external: open this URL in a new context. Selection
    /// state is unchanged and the deep link is not touched.
    OpenExternal(String),
    /// A newer navigation started while this one was in flight; its result
    /// was discarded.
    Superseded,
    /// The item had nothing to select (no asset path).
    Ignored,
}

/// Owns the documentation pipeline state for one session.
pub struct DocService {
    navigator: Navigator,
    fetcher: Arc<PageFetcher>,
    indexer: SearchIndexer,
    engine: SearchEngine,
    artifact_path: Option<std::path::PathBuf>,
    sitemap: RwLock<Arc<Sitemap>>,
    diagnostics: RwLock<Vec<Diagnostic>>,
    selection: RwLock<Option<Selection>>,
    location: RwLock<Location>,
    search_query: RwLock<String>,
    nav_generation: AtomicU64,
}

impl DocService {
    /// Creates the service from configuration. No I/O happens until
    /// [`DocService::init`].
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Creates the service with an overridden remote base URL (primarily
    /// for tests).
    pub fn with_raw_base(config: Config, raw_base: impl Into<String>) -> Result<Self> {
        Self::build(config, Some(raw_base.into()))
    }

    fn build(config: Config, raw_base: Option<String>) -> Result<Self> {
        let mut fetcher = PageFetcher::new(config.source.clone(), &config.fetch)?;
        if let Some(base) = raw_base {
            fetcher = fetcher.with_raw_base(base);
        }
        let fetcher = Arc::new(fetcher);

        let artifact_path = (config.source.mode == SourceMode::Local)
            .then(|| config.source.local_root.join(&config.index.artifact_file));

        let indexer = SearchIndexer::new(Arc::clone(&fetcher), config.index.concurrency);
        let engine = SearchEngine::new(indexer.store());

        Ok(Self {
            navigator: Navigator::new(config.base_path.clone()),
            fetcher,
            indexer,
            engine,
            artifact_path,
            sitemap: RwLock::new(Arc::new(Sitemap::default())),
            diagnostics: RwLock::new(Vec::new()),
            selection: RwLock::new(None),
            location: RwLock::new(Location::new(String::new())),
            search_query: RwLock::new(String::new()),
            nav_generation: AtomicU64::new(0),
        })
    }

    /// Loads the manifest, publishes the sitemap, and starts indexing.
    ///
    /// The sitemap is always assigned before the indexing run begins. A
    /// manifest fetch failure degrades to an empty sitemap with an error
    /// diagnostic; it never fails the caller.
    pub async fn init(&self) -> Arc<Sitemap> {
        let parsed = match self.fetcher.fetch_manifest().await {
            Ok(text) => parse_manifest(&text),
            Err(err) => {
                warn!("Manifest fetch failed: {err}");
                let mut parsed = parse_manifest("");
                parsed.diagnostics.push(Diagnostic {
                    severity: DiagnosticSeverity::Error,
                    message: format!("Manifest unavailable: {err}"),
                    line: None,
                });
                parsed
            },
        };

        let sitemap = Arc::new(parsed.sitemap);
        *self.write(&self.sitemap) = Arc::clone(&sitemap);
        *self.write(&self.diagnostics) = parsed.diagnostics;

        self.seed_from_artifact();
        self.indexer.start(&sitemap);
        info!(
            "Loaded sitemap: {} sections, {} quick links",
            sitemap.sections.len(),
            sitemap.quick_links.len()
        );
        sitemap
    }

    /// Refetches the manifest and restarts indexing, superseding any run in
    /// flight. Entries already indexed stay until overwritten.
    pub async fn reload(&self) -> Arc<Sitemap> {
        self.indexer.cancel();
        self.init().await
    }

    /// Cancels background work. The service can be re-initialized after.
    pub fn dispose(&self) {
        self.indexer.cancel();
    }

    /// The current sitemap (empty before `init`).
    #[must_use]
    pub fn sitemap(&self) -> Arc<Sitemap> {
        Arc::clone(&self.read(&self.sitemap))
    }

    /// Diagnostics from the last manifest parse.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.read(&self.diagnostics).clone()
    }

    /// True while a content indexing run is in flight.
    #[must_use]
    pub fn is_indexing(&self) -> bool {
        self.indexer.store().is_indexing()
    }

    /// The shared content index store (read access for consumers).
    #[must_use]
    pub fn index_store(&self) -> Arc<crate::indexer::IndexStore> {
        self.indexer.store()
    }

    /// The current selection, if a page has been rendered.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        self.read(&self.selection).clone()
    }

    /// The current deep-link location.
    #[must_use]
    pub fn location(&self) -> Location {
        self.read(&self.location).clone()
    }

    /// Records a heading-anchor jump on the current page.
    pub fn set_fragment(&self, heading_id: impl Into<String>) {
        self.write(&self.location).fragment = Some(heading_id.into());
    }

    /// Sets the live search query driving [`DocService::hits`].
    pub fn set_query(&self, query: impl Into<String>) {
        *self.write(&self.search_query) = query.into();
    }

    /// Hits for the live search query.
    #[must_use]
    pub fn hits(&self) -> Vec<crate::types::SearchHit> {
        let query = self.read(&self.search_query).clone();
        self.search(&query)
    }

    /// Evaluates one query against the sitemap and index.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<crate::types::SearchHit> {
        self.engine.search(&self.sitemap(), query)
    }

    /// Selects an item for display.
    ///
    /// Internal items are fetched and rendered, with the pending search
    /// query (or `term`) used for in-page highlighting; the query is
    /// consumed. A fetch failure renders the error placeholder instead of
    /// failing. External items produce [`SelectOutcome::OpenExternal`] and
    /// leave the selection alone.
    pub async fn select(&self, item: &DocItem, term: Option<&str>) -> SelectOutcome {
        if item.is_external {
            return item.url.clone().map_or(SelectOutcome::Ignored, |url| {
                SelectOutcome::OpenExternal(url)
            });
        }
        let Some(asset_path) = item.asset_path.clone() else {
            return SelectOutcome::Ignored;
        };

        // Claim the navigation generation before any suspension point;
        // whoever claims last wins.
        let generation = self.nav_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let pending = {
            let mut query = self.write(&self.search_query);
            let chosen = term.map_or_else(|| query.clone(), str::to_string);
            query.clear();
            chosen
        };
        let term = pending.trim();
        let highlight = (term.len() >= MIN_TERM_LEN).then(|| term.to_string());

        // The deep link updates at selection time, not render time
        {
            let mut location = self.write(&self.location);
            if let Some(next) = self.navigator.deep_link(item, &location) {
                *location = next;
            }
        }

        let rendered = match self.fetcher.fetch_page(&asset_path).await {
            Ok(markdown) => renderer::render(&markdown, highlight.as_deref()),
            Err(err) => {
                warn!("Page fetch failed for '{asset_path}': {err}");
                renderer::Rendered {
                    html: ERROR_PLACEHOLDER_HTML.to_string(),
                    toc: Vec::new(),
                }
            },
        };

        if self.nav_generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding superseded render for '{asset_path}'");
            return SelectOutcome::Superseded;
        }

        let selection = Selection {
            item: item.clone(),
            html: rendered.html,
            toc: rendered.toc,
        };
        *self.write(&self.selection) = Some(selection.clone());
        SelectOutcome::Rendered(selection)
    }

    /// Selects the item for an application path (`<base>/docs/<slug>`),
    /// falling back to the first item for unknown slugs.
    pub async fn restore(&self, path: &str) -> SelectOutcome {
        let sitemap = self.sitemap();
        let Some(item) = self.navigator.restore(&sitemap, path).cloned() else {
            return SelectOutcome::Ignored;
        };
        self.select(&item, None).await
    }

    /// Resolves a rendered-page link to an item and selects it. Links that
    /// do not resolve are ignored.
    pub async fn follow_link(&self, href: &str) -> SelectOutcome {
        let sitemap = self.sitemap();
        let Some(item) = Navigator::resolve_internal_link(&sitemap, href).cloned() else {
            return SelectOutcome::Ignored;
        };
        self.select(&item, None).await
    }

    fn seed_from_artifact(&self) {
        let Some(path) = self.artifact_path.as_deref() else {
            return;
        };
        if !path.exists() {
            return;
        }
        match artifact::load_index_artifact(path) {
            Ok(entries) => {
                info!("Seeding index from artifact ({} pages)", entries.len());
                self.indexer.store().seed(entries);
            },
            Err(err) => warn!("Ignoring unreadable index artifact: {err}"),
        }
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
        lock.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
        lock.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, SourceMode};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIDEBAR: &str = "\
# Docs

## Getting Started {icon=rocket, description=First steps}
- [Home](home.md) {icon=home, description=\"Start here\"}
- [Install](install.md)

## Quick Links
- [Releases](https://example.com/releases)

## Help
- [FAQ](help/faq.md)
- [Forum](https://forum.example.com) {icon=chat}
";

    fn local_fixture() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("help")).unwrap();
        std::fs::write(dir.path().join("sidebar.md"), SIDEBAR).unwrap();
        std::fs::write(
            dir.path().join("home.md"),
            "# Welcome Home\n\nThe quick brown fox lives here.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("install.md"),
            "## Install Steps\n\nDownload and run the installer.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("help/faq.md"), "# FAQ\n\nAnswers.\n").unwrap();

        let config = Config {
            source: SourceConfig {
                mode: SourceMode::Local,
                local_root: dir.path().to_path_buf(),
                ..SourceConfig::default()
            },
            ..Config::default()
        };
        (dir, config)
    }

    async fn wait_indexed(service: &DocService) {
        for _ in 0..400 {
            if !service.is_indexing() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("indexing did not finish");
    }

    #[tokio::test]
    async fn test_init_publishes_sitemap_then_indexes() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();

        let sitemap = service.init().await;
        assert_eq!(sitemap.sections.len(), 2);
        assert_eq!(sitemap.quick_links.len(), 1);
        assert!(service.diagnostics().is_empty());

        wait_indexed(&service).await;
        let hits = service.search("installer");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.title, "Install");
    }

    #[tokio::test]
    async fn test_select_renders_and_updates_location() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();
        let sitemap = service.init().await;

        let home = sitemap.first_item().unwrap().clone();
        match service.select(&home, None).await {
            SelectOutcome::Rendered(selection) => {
                assert!(selection.html.contains("id=\"welcome-home\""));
                assert_eq!(selection.toc.len(), 1);
            },
            other => panic!("Expected Rendered, got {other:?}"),
        }

        assert_eq!(service.location().href(), "/docs/home");
        assert_eq!(service.selection().unwrap().item.title, "Home");
    }

    #[tokio::test]
    async fn test_select_with_search_term_highlights_and_clears_query() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();
        let sitemap = service.init().await;

        service.set_query("fox");
        let home = sitemap.first_item().unwrap().clone();
        let SelectOutcome::Rendered(selection) = service.select(&home, None).await else {
            panic!("Expected Rendered");
        };

        assert!(selection
            .html
            .contains("<mark class=\"content-highlight\">fox</mark>"));
        // The pending query is consumed by selection
        assert!(service.hits().is_empty());
    }

    #[tokio::test]
    async fn test_select_missing_page_degrades_to_placeholder() {
        let (_dir, mut config) = local_fixture();
        // Unreachable fallback keeps the failure local
        config.source.repo = "nobody/nowhere".to_string();
        let service = DocService::with_raw_base(config, "http://127.0.0.1:9").unwrap();
        service.init().await;

        let missing = DocItem::internal("Ghost".to_string(), "ghost.md".to_string());
        let SelectOutcome::Rendered(selection) = service.select(&missing, None).await else {
            panic!("Expected Rendered placeholder");
        };

        assert_eq!(selection.html, ERROR_PLACEHOLDER_HTML);
        assert!(selection.toc.is_empty());
    }

    #[tokio::test]
    async fn test_select_external_leaves_selection_alone() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();
        let sitemap = service.init().await;

        let home = sitemap.first_item().unwrap().clone();
        service.select(&home, None).await;
        let before = service.location();

        let forum = sitemap.sections[1].items[1].clone();
        assert!(forum.is_external);
        match service.select(&forum, None).await {
            SelectOutcome::OpenExternal(url) => assert_eq!(url, "https://forum.example.com"),
            other => panic!("Expected OpenExternal, got {other:?}"),
        }

        assert_eq!(service.selection().unwrap().item.title, "Home");
        assert_eq!(service.location(), before);
    }

    #[tokio::test]
    async fn test_restore_unknown_slug_falls_back_to_first() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();
        service.init().await;

        let SelectOutcome::Rendered(selection) = service.restore("/docs/never-heard-of").await
        else {
            panic!("Expected Rendered");
        };
        assert_eq!(selection.item.title, "Home");

        let SelectOutcome::Rendered(selection) = service.restore("/docs/faq").await else {
            panic!("Expected Rendered");
        };
        assert_eq!(selection.item.title, "FAQ");
    }

    #[tokio::test]
    async fn test_fragment_survives_reselection_only() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();
        let sitemap = service.init().await;

        let home = sitemap.first_item().unwrap().clone();
        let install = sitemap.sections[0].items[1].clone();

        service.select(&home, None).await;
        service.set_fragment("welcome-home");
        assert_eq!(service.location().href(), "/docs/home#welcome-home");

        // Re-selecting the same page keeps the fragment
        service.select(&home, None).await;
        assert_eq!(service.location().href(), "/docs/home#welcome-home");

        // Navigating away drops it
        service.select(&install, None).await;
        assert_eq!(service.location().href(), "/docs/install");
    }

    #[tokio::test]
    async fn test_last_navigation_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/acme/site/main/docs/sidebar.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "## S\n- [Slow](slow.md)\n- [Fast](fast.md)",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme/site/main/docs/slow.md"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("# Slow Page")
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/acme/site/main/docs/fast.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Fast Page"))
            .mount(&server)
            .await;

        let config = Config {
            source: SourceConfig {
                mode: SourceMode::Remote,
                repo: "acme/site".to_string(),
                branch: "main".to_string(),
                path_prefix: "docs".to_string(),
                ..SourceConfig::default()
            },
            ..Config::default()
        };
        let service = DocService::with_raw_base(config, server.uri()).unwrap();
        let sitemap = service.init().await;

        let slow = sitemap.sections[0].items[0].clone();
        let fast = sitemap.sections[0].items[1].clone();

        let (slow_outcome, fast_outcome) =
            tokio::join!(service.select(&slow, None), service.select(&fast, None));

        assert!(matches!(slow_outcome, SelectOutcome::Superseded));
        assert!(matches!(fast_outcome, SelectOutcome::Rendered(_)));
        assert_eq!(service.selection().unwrap().item.title, "Fast");
        assert_eq!(service.location().href(), "/docs/fast");
    }

    #[tokio::test]
    async fn test_manifest_failure_degrades_to_empty_sitemap() {
        let config = Config {
            source: SourceConfig {
                mode: SourceMode::Remote,
                ..SourceConfig::default()
            },
            ..Config::default()
        };
        let service = DocService::with_raw_base(config, "http://127.0.0.1:9").unwrap();

        let sitemap = service.init().await;
        assert!(sitemap.sections.is_empty());
        let diagnostics = service.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(diagnostics[0].severity, DiagnosticSeverity::Error));
        assert!(!service.is_indexing());
    }

    #[tokio::test]
    async fn test_init_seeds_from_artifact() {
        let (dir, config) = local_fixture();
        // Precompute the artifact; content search works before any runtime
        // indexing completes
        crate::artifact::write_index_artifact(
            dir.path(),
            "sidebar.md",
            &dir.path().join("search-index.json"),
        )
        .unwrap();

        let service = DocService::new(config).unwrap();
        service.init().await;

        let hits = service.search("answers");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].item.title, "FAQ");
        wait_indexed(&service).await;
    }

    #[tokio::test]
    async fn test_reload_is_idempotent_for_unchanged_content() {
        let (_dir, config) = local_fixture();
        let service = DocService::new(config).unwrap();

        service.init().await;
        wait_indexed(&service).await;
        let first = service.indexer.store().snapshot();

        service.reload().await;
        wait_indexed(&service).await;
        let second = service.indexer.store().snapshot();

        assert_eq!(first, second);
        service.dispose();
        assert!(!service.is_indexing());
    }
}
