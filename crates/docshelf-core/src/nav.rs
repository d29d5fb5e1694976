//! Navigation and deep-link mapping between items and URL slugs.
//!
//! The URL contract reserves one path segment for documentation navigation:
//! `<base>/docs/<slug>[#<heading-id>]`. Slugs derive from the item's
//! filename when it has one (extension stripped), otherwise from a slugified
//! title. Internal page links resolve the same way, by file stem, so both
//! directions use one consistent rule.

use crate::types::{DocItem, Sitemap};

/// A resolved navigation target: path plus optional heading fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub fragment: Option<String>,
}

impl Location {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fragment: None,
        }
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// The full location string, `path` plus `#fragment` when present.
    #[must_use]
    pub fn href(&self) -> String {
        match &self.fragment {
            Some(fragment) => format!("{}#{fragment}", self.path),
            None => self.path.clone(),
        }
    }
}

/// Maps items to and from URL slugs under a fixed base path.
#[derive(Debug, Clone)]
pub struct Navigator {
    base_path: String,
}

impl Navigator {
    /// Creates a navigator. `base_path` is the application prefix before
    /// `/docs` (empty for a root-mounted application).
    #[must_use]
    pub fn new(base_path: impl Into<String>) -> Self {
        let mut base_path = base_path.into();
        while base_path.ends_with('/') {
            base_path.pop();
        }
        Self { base_path }
    }

    /// The slug for an item: file stem of its asset path, or slugified
    /// title for items without one.
    #[must_use]
    pub fn slug_of(item: &DocItem) -> String {
        if let Some(path) = item.asset_path.as_deref() {
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let stem = match file_name.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem,
                _ => file_name,
            };
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
        Self::title_slug(&item.title)
    }

    /// Slugifies a title: lowercase, whitespace runs to hyphens, everything
    /// outside `[a-z0-9-]` dropped.
    #[must_use]
    pub fn title_slug(title: &str) -> String {
        let mut slug = String::with_capacity(title.len());
        let mut pending_hyphen = false;
        for c in title.trim().to_lowercase().chars() {
            if c.is_whitespace() {
                pending_hyphen = !slug.is_empty();
            } else if c.is_ascii_alphanumeric() || c == '-' {
                if pending_hyphen {
                    slug.push('-');
                    pending_hyphen = false;
                }
                slug.push(c);
            }
        }
        slug
    }

    /// First item whose slug equals `slug`, scanning all sections' items in
    /// navigation order. Returns `None` when unknown (not an error).
    #[must_use]
    pub fn find_by_slug<'a>(sitemap: &'a Sitemap, slug: &str) -> Option<&'a DocItem> {
        sitemap.items().find(|item| Self::slug_of(item) == slug)
    }

    /// Extracts the slug segment from an application path
    /// (`<base>/docs/<slug>`), if present.
    #[must_use]
    pub fn slug_from_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let relative = path.strip_prefix(self.base_path.as_str()).unwrap_or(path);
        let mut parts = relative.split('/').filter(|p| !p.is_empty());
        if parts.next() != Some("docs") {
            return None;
        }
        parts.next().filter(|slug| !slug.is_empty())
    }

    /// Restores the selection for an application path: the slug's item, or
    /// the sitemap's first item as the fallback for unknown or absent slugs.
    #[must_use]
    pub fn restore<'a>(&self, sitemap: &'a Sitemap, path: &str) -> Option<&'a DocItem> {
        self.slug_from_path(path)
            .and_then(|slug| Self::find_by_slug(sitemap, slug))
            .or_else(|| sitemap.first_item())
    }

    /// The location to push for selecting an internal item.
    ///
    /// A hash fragment survives a no-op reselection (same slug) and is
    /// dropped when navigating to a different page. External items never
    /// produce a location; the caller opens them in a new context and
    /// selection state is left untouched.
    #[must_use]
    pub fn deep_link(&self, item: &DocItem, current: &Location) -> Option<Location> {
        if item.is_external {
            return None;
        }

        let slug = Self::slug_of(item);
        let fragment = self
            .slug_from_path(&current.path)
            .filter(|current_slug| *current_slug == slug)
            .and_then(|_| current.fragment.clone());

        Some(Location {
            path: format!("{}/docs/{slug}", self.base_path),
            fragment,
        })
    }

    /// Resolves an internal page link (`href` from rendered content) to an
    /// item by file-stem slug.
    #[must_use]
    pub fn resolve_internal_link<'a>(sitemap: &'a Sitemap, href: &str) -> Option<&'a DocItem> {
        let target = href.split('#').next().unwrap_or(href);
        let file_name = target.rsplit('/').next()?;
        let slug = match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file_name,
        };
        if slug.is_empty() {
            return None;
        }
        Self::find_by_slug(sitemap, slug)
    }
}
