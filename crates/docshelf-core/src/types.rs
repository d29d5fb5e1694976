use serde::{Deserialize, Serialize};

/// One documentation entry from the sidebar manifest.
///
/// Exactly one of `url` (external) or `asset_path` (internal) is set;
/// `is_external` reflects which. [`DocItem::external`] and
/// [`DocItem::internal`] uphold the invariant at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_path: Option<String>,
    pub is_external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl DocItem {
    /// Creates an internal item backed by a content file.
    #[must_use]
    pub const fn internal(title: String, asset_path: String) -> Self {
        Self {
            title,
            description: None,
            url: None,
            asset_path: Some(asset_path),
            is_external: false,
            icon: None,
        }
    }

    /// Creates an external item pointing at a URL.
    #[must_use]
    pub const fn external(title: String, url: String) -> Self {
        Self {
            title,
            description: None,
            url: Some(url),
            asset_path: None,
            is_external: true,
            icon: None,
        }
    }

    /// True iff the item is backed by a fetchable content file.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        !self.is_external && self.asset_path.is_some()
    }
}

/// A named, ordered grouping of documentation items.
///
/// Section order and item order both follow the manifest source order and
/// drive navigation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocSection {
    pub title: String,
    pub icon: String,
    pub description: String,
    pub items: Vec<DocItem>,
}

/// The full parse result of a sidebar manifest: ordered sections plus the
/// distinguished quick-links list. Immutable once produced; shared read-only
/// by the indexer, the search engine, and the navigation controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sitemap {
    pub sections: Vec<DocSection>,
    pub quick_links: Vec<DocItem>,
}

impl Sitemap {
    /// Iterates all section items in navigation order (quick links excluded).
    pub fn items(&self) -> impl Iterator<Item = &DocItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    /// Iterates the internal items eligible for content indexing.
    pub fn internal_items(&self) -> impl Iterator<Item = &DocItem> {
        self.items().filter(|i| i.is_internal())
    }

    /// The default selection when no slug is given or a slug is unknown.
    #[must_use]
    pub fn first_item(&self) -> Option<&DocItem> {
        self.sections.first().and_then(|s| s.items.first())
    }
}

/// Which field of an item a search query matched, in tie-break priority
/// order: title > description > content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Title,
    Description,
    Content,
}

/// One search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub item: DocItem,
    pub section_title: String,
    /// Sanitized HTML fragment with the match wrapped in a highlight marker.
    pub snippet: String,
    pub match_kind: MatchKind,
}

/// One table-of-contents row derived from a rendered page heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub id: String,
    pub text: String,
    pub level: u8,
}

/// A non-fatal problem reported while parsing the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warn,
    Info,
}
