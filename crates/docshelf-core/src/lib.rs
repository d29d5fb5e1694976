//! # docshelf-core
//!
//! Core functionality for docshelf - a documentation content pipeline that
//! turns a sidebar manifest plus a tree of markdown pages into a navigable,
//! searchable, safely rendered documentation set.
//!
//! ## Architecture
//!
//! The crate is organized around the pipeline's stages:
//!
//! - **Fetching**: manifest and page retrieval from a bundled local
//!   directory or a remote raw-file endpoint, with fallback
//! - **Manifest parsing**: the line-oriented sidebar format becomes a
//!   [`Sitemap`] of sections, items, and quick links
//! - **Indexing**: bounded-concurrency, cancellable population of the
//!   in-memory full-text index
//! - **Search**: case-insensitive substring matching with highlighted
//!   snippets
//! - **Rendering**: markdown to sanitized HTML with heading anchors, icon
//!   directives, and search-term highlighting
//! - **Navigation**: slug/deep-link mapping with last-navigation-wins
//!   selection, owned by [`DocService`]
//!
//! ## Quick Start
//!
//! ```rust
//! use docshelf_core::{parse_manifest, Navigator};
//!
//! let parsed = parse_manifest(
//!     "## Getting Started {icon=rocket}\n- [Install](install.md) {description=\"How to install\"}",
//! );
//! let sitemap = parsed.sitemap;
//!
//! assert_eq!(sitemap.sections[0].title, "Getting Started");
//! let install = &sitemap.sections[0].items[0];
//! assert_eq!(Navigator::slug_of(install), "install");
//! assert_eq!(Navigator::find_by_slug(&sitemap, "install"), Some(install));
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, Error>`]. The pipeline itself is
//! deliberately forgiving: manifest lines that fail to parse are skipped
//! with diagnostics, failed page fetches degrade to a placeholder, and
//! failed indexing fetches leave a coverage gap. No error here is fatal.

/// Build-time search index artifact
pub mod artifact;
/// Configuration management
pub mod config;
/// Error types and result aliases
pub mod error;
/// Manifest and page fetching with local/remote fallback
pub mod fetcher;
/// Asynchronous full-text index population
pub mod indexer;
/// Sidebar manifest parsing
pub mod manifest;
/// Slug and deep-link navigation mapping
pub mod nav;
/// Markdown rendering to sanitized HTML
pub mod renderer;
/// Query evaluation over sitemap and index
pub mod search;
/// The documentation service owning pipeline state
pub mod service;
/// Core data types and structures
pub mod types;

// Re-export commonly used types
pub use config::{Config, FetchConfig, IndexConfig, SourceConfig, SourceMode};
pub use error::{Error, Result};
pub use fetcher::PageFetcher;
pub use indexer::{IndexStore, SearchIndexer};
pub use manifest::{parse_manifest, ItemMeta, ManifestParse, SectionMeta};
pub use nav::{Location, Navigator};
pub use renderer::{render, Rendered, ERROR_PLACEHOLDER_HTML};
pub use search::SearchEngine;
pub use service::{DocService, Selection, SelectOutcome};
pub use types::*;
