//! Content fetching for manifest and page files.
//!
//! Two interchangeable providers: a bundled local directory of markdown
//! files, and a remote raw-file endpoint addressed by repository, branch,
//! and path prefix. In local mode a failed local read falls back to the
//! remote endpoint, so the remote must always remain reachable as a backstop.

use crate::config::{FetchConfig, SourceConfig, SourceMode};
use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL of the remote raw-file endpoint.
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Fetches raw text content (the sidebar manifest, or a single page) from
/// the configured provider, with remote fallback on local failure.
pub struct PageFetcher {
    client: Client,
    source: SourceConfig,
    raw_base: String,
}

impl PageFetcher {
    /// Creates a fetcher with a configured HTTP client.
    pub fn new(source: SourceConfig, fetch: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(concat!("docshelf/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            source,
            raw_base: RAW_BASE.to_string(),
        })
    }

    /// Overrides the remote base URL (primarily for tests).
    #[must_use]
    pub fn with_raw_base(mut self, base: impl Into<String>) -> Self {
        self.raw_base = base.into();
        self
    }

    /// Fetches the sidebar manifest text.
    pub async fn fetch_manifest(&self) -> Result<String> {
        self.fetch_relative(&self.source.manifest_file).await
    }

    /// Fetches the raw markdown of a single page by its asset path.
    ///
    /// A path that is itself a URL yields empty content: external items have
    /// nothing to fetch here, and callers treat the empty string as "no
    /// indexable content" rather than an error.
    pub async fn fetch_page(&self, path: &str) -> Result<String> {
        if path.starts_with("http") {
            return Ok(String::new());
        }
        self.fetch_relative(path).await
    }

    async fn fetch_relative(&self, path: &str) -> Result<String> {
        match self.source.mode {
            SourceMode::Local => match self.read_local(path).await {
                Ok(content) => Ok(content),
                Err(err) => {
                    warn!("Local read failed for '{path}', falling back to remote: {err}");
                    self.fetch_remote(path).await
                },
            },
            SourceMode::Remote => self.fetch_remote(path).await,
        }
    }

    async fn read_local(&self, path: &str) -> Result<String> {
        let resolved = self.resolve_local(path)?;
        debug!("Reading local content file {}", resolved.display());
        let content = tokio::fs::read_to_string(&resolved).await?;
        Ok(content)
    }

    /// Resolves a relative asset path under the local root, rejecting
    /// traversal outside it.
    fn resolve_local(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(Error::NotFound(format!(
                "Asset path '{path}' escapes the content root"
            )));
        }
        Ok(self.source.local_root.join(relative))
    }

    async fn fetch_remote(&self, path: &str) -> Result<String> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, self.source.repo, self.source.branch, self.source.path_prefix, path
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            if status == StatusCode::NOT_FOUND {
                return Err(Error::NotFound(format!(
                    "Content not found at '{url}'. Check the manifest asset path"
                )));
            }
            match response.error_for_status() {
                Ok(_) => unreachable!("Status should be an error"),
                Err(err) => return Err(Error::Network(err)),
            }
        }

        let content = response.text().await?;
        info!("Fetched {} bytes from {}", content.len(), url);
        Ok(content)
    }
}
