//! Error types and handling for docshelf-core operations.
//!
//! Every public fallible operation in this crate returns [`Result<T>`].
//! Errors are categorized for logging and include a recoverability hint for
//! retry logic. Note that most failures in the pipeline are handled *before*
//! they reach a caller: a malformed manifest line becomes a diagnostic, a
//! failed page fetch becomes a placeholder selection, and a failed indexing
//! fetch becomes a coverage gap. The variants below cover the cases that do
//! surface.

use thiserror::Error;

/// The main error type for docshelf-core operations.
///
/// `Display` provides user-friendly messages; the full source chain is
/// preserved through `source()` for the `Io` and `Network` variants.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers reads from the bundled local content directory and artifact
    /// file access. The underlying `std::io::Error` is preserved.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers HTTP requests against the remote raw-file endpoint. The
    /// underlying `reqwest::Error` is preserved for connection detail.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A manifest line could not be parsed.
    ///
    /// Raised per line inside the parser, where it is logged, recorded as a
    /// diagnostic, and skipped. Parsing a manifest never fails as a whole; a
    /// single bad item never aborts the remaining lines.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Search index artifact operation failed.
    ///
    /// Covers loading and writing the precomputed index artifact, not
    /// per-page indexing fetches (those degrade to missing entries).
    #[error("Index error: {0}")]
    Index(String),

    /// Requested resource was not found.
    ///
    /// Used for missing pages (HTTP 404, absent local files) and unknown
    /// navigation slugs when no fallback item exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    ///
    /// Occurs when the search index artifact or a config file cannot be
    /// converted to or from its on-disk format.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for errors that are typically temporary (network
    /// timeouts, connection failures, interrupted I/O) and might succeed on
    /// retry. Parse, config, and not-found errors are permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Io(e) => {
                matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                )
            },
            _ => false,
        }
    }

    /// Get the error category as a static string identifier.
    ///
    /// Useful for grouping errors in logs or metrics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Manifest(_) => "manifest",
            Self::Index(_) => "index",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
