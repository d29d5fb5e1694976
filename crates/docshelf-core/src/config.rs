//! Configuration for the docshelf content pipeline.
//!
//! Configuration is stored in TOML format and controls where documentation
//! content is fetched from, HTTP behavior, and indexing behavior.
//!
//! ## File Location
//!
//! The configuration file is loaded from the platform config directory
//! (e.g. `~/.config/docshelf/config.toml` on Linux). The `DOCSHELF_CONFIG`
//! environment variable overrides the path explicitly, which tests rely on.
//! A missing file yields defaults; a malformed file is an error.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [source]
//! mode = "local"
//! local_root = "public/docs"
//! repo = "docshelf/docshelf-website"
//! branch = "main"
//! path_prefix = "public/docs"
//! manifest_file = "sidebar.md"
//!
//! [fetch]
//! timeout_secs = 30
//!
//! [index]
//! concurrency = 4
//! artifact_file = "search-index.json"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application path prefix before `/docs` in deep links. Empty for a
    /// root-mounted application.
    pub base_path: String,
    /// Where documentation content comes from.
    pub source: SourceConfig,
    /// HTTP fetch behavior.
    pub fetch: FetchConfig,
    /// Search indexing behavior.
    pub index: IndexConfig,
}

/// Content source selection.
///
/// Two interchangeable providers exist: a bundled local directory of
/// markdown files, and a remote raw-file endpoint for a fixed
/// repository/branch/path prefix. The remote is always available as a
/// fallback when a local file is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Which provider to consult first.
    pub mode: SourceMode,
    /// Root of the bundled local content directory.
    pub local_root: PathBuf,
    /// Remote repository in `owner/name` form.
    pub repo: String,
    /// Remote branch.
    pub branch: String,
    /// Path prefix inside the repository under which content lives.
    pub path_prefix: String,
    /// Manifest filename, relative to the content root.
    pub manifest_file: String,
}

/// Which content provider is consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Read from the bundled local directory, falling back to the remote
    /// endpoint when a local file is absent or unreadable.
    Local,
    /// Fetch from the remote raw-file endpoint only.
    Remote,
}

/// HTTP fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Search indexing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Fixed worker budget for concurrent indexing fetches.
    pub concurrency: usize,
    /// Filename of the precomputed search index artifact.
    pub artifact_file: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Local,
            local_root: PathBuf::from("public/docs"),
            repo: "docshelf/docshelf-website".to_string(),
            branch: "main".to_string(),
            path_prefix: "public/docs".to_string(),
            manifest_file: "sidebar.md".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            artifact_file: "search-index.json".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined, or if
    /// the config file exists but cannot be read or contains invalid TOML.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, defaulting when absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration to the default location, creating parent
    /// directories as needed.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {e}")))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        // Test/dev override: DOCSHELF_CONFIG points at an explicit file
        if let Ok(path) = std::env::var("DOCSHELF_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let dirs = directories::ProjectDirs::from("", "", "docshelf")
            .ok_or_else(|| Error::Config("Cannot determine config directory".to_string()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}
