//! Sidebar manifest parsing.
//!
//! The manifest is a line-oriented, UTF-8 plain-text format:
//!
//! ```text
//! # Document Title                         <- ignored
//! ## Getting Started {icon=rocket}         <- opens a section
//! - [Install](install.md) {description="How to install"}
//! - [Forum](https://forum.example.com)     <- external item
//! ## Quick Links                           <- distinguished pseudo-section
//! - [Download](https://example.com/dl)
//! ```
//!
//! Parsing is tolerant: a malformed bullet line is logged, recorded as a
//! diagnostic, and skipped; it never aborts the rest of the manifest.
//! Unknown metadata keys are ignored silently. The result is deterministic:
//! the same input text yields an identical [`Sitemap`] on every run.

use crate::types::{Diagnostic, DiagnosticSeverity, DocItem, DocSection, Sitemap};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Section title that routes subsequent items into the quick-links list
/// instead of a regular section.
const QUICK_LINKS_TITLE: &str = "Quick Links";

#[allow(clippy::unwrap_used)]
static SECTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^## (.*?)(?:\s*\{(.*)\})?$").unwrap());

#[allow(clippy::unwrap_used)]
static ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^- \[(.*?)\]\((.*?)\)(?:\s*\{(.*)\})?$").unwrap());

/// Result of parsing a manifest: the sitemap plus any per-line diagnostics.
#[derive(Debug, Clone)]
pub struct ManifestParse {
    pub sitemap: Sitemap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Recognized section metadata, with documented defaults.
#[derive(Debug, Clone)]
pub struct SectionMeta {
    /// Icon name. Default: `"folder"`.
    pub icon: String,
    /// Short description. Default: empty.
    pub description: String,
}

/// Recognized item metadata. All keys optional.
#[derive(Debug, Clone, Default)]
pub struct ItemMeta {
    pub icon: Option<String>,
    pub description: Option<String>,
    /// The `type` key. Parsed and carried for forward compatibility with
    /// manifest authors; no recognized values affect item construction.
    pub kind: Option<String>,
}

/// Parses manifest text into a [`Sitemap`].
///
/// Never fails as a whole: unparseable bullet lines are skipped with a
/// diagnostic, and an empty or structure-free input simply yields an empty
/// sitemap.
#[must_use]
pub fn parse_manifest(content: &str) -> ManifestParse {
    let mut sections: Vec<DocSection> = Vec::new();
    let mut quick_links: Vec<DocItem> = Vec::new();
    let mut diagnostics = Vec::new();
    let mut in_quick_links = false;

    for (line_no, raw) in content.lines().enumerate() {
        let line = raw.trim();
        // Blank lines and the document title are ignored everywhere
        if line.is_empty() || line.starts_with("# ") {
            continue;
        }

        if line.starts_with("## ") {
            match parse_section_line(line) {
                Some((title, meta)) => {
                    if title == QUICK_LINKS_TITLE {
                        in_quick_links = true;
                    } else {
                        in_quick_links = false;
                        sections.push(DocSection {
                            title,
                            icon: meta.icon,
                            description: meta.description,
                            items: Vec::new(),
                        });
                    }
                },
                None => {
                    warn!("Skipping section header with empty title: \"{line}\"");
                    diagnostics.push(skipped(line_no, line));
                },
            }
        } else if line.starts_with("- ") {
            match parse_item_line(line) {
                Ok(item) => {
                    if in_quick_links {
                        quick_links.push(item);
                    } else if let Some(section) = sections.last_mut() {
                        section.items.push(item);
                    }
                    // An item before any section header has nowhere to go
                    // and is dropped, matching navigation semantics.
                },
                Err(err) => {
                    warn!("Malformed manifest line: {err}");
                    diagnostics.push(skipped(line_no, line));
                },
            }
        }
        // Anything else (prose, HTML comments) is ignored
    }

    ManifestParse {
        sitemap: Sitemap {
            sections,
            quick_links,
        },
        diagnostics,
    }
}

fn skipped(line_no: usize, line: &str) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Warn,
        message: format!("Skipped unparseable line: \"{line}\""),
        line: Some(line_no + 1),
    }
}

fn parse_section_line(line: &str) -> Option<(String, SectionMeta)> {
    let caps = SECTION_RE.captures(line)?;
    let title = caps.get(1).map(|m| m.as_str().trim())?;
    if title.is_empty() {
        return None;
    }

    let meta = parse_metadata(caps.get(2).map(|m| m.as_str()));
    Some((
        title.to_string(),
        SectionMeta {
            icon: meta
                .iter()
                .find(|(k, _)| k == "icon")
                .map_or_else(|| "folder".to_string(), |(_, v)| v.clone()),
            description: meta
                .iter()
                .find(|(k, _)| k == "description")
                .map_or_else(String::new, |(_, v)| v.clone()),
        },
    ))
}

fn parse_item_line(line: &str) -> Result<DocItem> {
    let caps = ITEM_RE
        .captures(line)
        .ok_or_else(|| Error::Manifest(format!("Unparseable item line: \"{line}\"")))?;

    let title = caps
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let target = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let meta = ItemMeta::from_pairs(&parse_metadata(caps.get(3).map(|m| m.as_str())));

    let is_external = target.starts_with("http");
    Ok(DocItem {
        title,
        description: meta.description,
        url: is_external.then(|| target.to_string()),
        asset_path: (!is_external).then(|| target.to_string()),
        is_external,
        icon: meta.icon,
    })
}

impl ItemMeta {
    fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut meta = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "icon" => meta.icon = Some(value.clone()),
                "description" => meta.description = Some(value.clone()),
                "type" => meta.kind = Some(value.clone()),
                // Unknown keys are ignored silently
                _ => {},
            }
        }
        meta
    }
}

/// Parses a `{key=value, key2=value2}` metadata suffix body.
///
/// Pairs split on `,`, then on the first `=`; both sides trimmed; a single
/// layer of matching surrounding quotes is stripped from the value. Pairs
/// without an `=` or with an empty key or value are dropped.
fn parse_metadata(meta_str: Option<&str>) -> Vec<(String, String)> {
    let Some(meta_str) = meta_str else {
        return Vec::new();
    };

    meta_str
        .split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            let value = unquote(value.trim());
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Strips one layer of surrounding quotes when both ends carry the same
/// quote character.
fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &value[1..value.len() - 1];
        }
    }
    value
}
