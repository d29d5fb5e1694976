//! Query evaluation over the sitemap and the content index.
//!
//! Matching is case-insensitive substring matching against item titles,
//! descriptions, and indexed page content. Content matches for a page are
//! only available once the indexer has written its entry; before that the
//! page simply cannot produce content hits (a coverage gap, not an error).

use crate::indexer::IndexStore;
use crate::types::{MatchKind, SearchHit, Sitemap};
use regex::Regex;
use std::sync::Arc;

/// Characters before the first match occurrence included in a snippet.
const SNIPPET_BEFORE: usize = 40;
/// Characters after the match (in addition to the query itself).
const SNIPPET_AFTER: usize = 60;
/// Queries shorter than this return no hits.
const MIN_QUERY_LEN: usize = 2;

/// Evaluates queries against a sitemap plus the shared index store.
pub struct SearchEngine {
    store: Arc<IndexStore>,
}

impl SearchEngine {
    #[must_use]
    pub const fn new(store: Arc<IndexStore>) -> Self {
        Self { store }
    }

    /// Returns ranked hits for `query` in navigation order.
    ///
    /// Queries shorter than two characters yield an empty result, not an
    /// error. `match_kind` is assigned by priority (title, then description,
    /// then content) and is the only ranking signal; callers may group by it.
    #[must_use]
    pub fn search(&self, sitemap: &Sitemap, query: &str) -> Vec<SearchHit> {
        let q = query.trim().to_lowercase();
        if q.len() < MIN_QUERY_LEN {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for section in &sitemap.sections {
            for item in &section.items {
                let content = item
                    .asset_path
                    .as_deref()
                    .and_then(|path| self.store.lookup(path));

                let title_match = item.title.to_lowercase().contains(&q);
                let desc_match = item
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&q));
                let content_match = content.as_deref().is_some_and(|c| c.contains(&q));

                if !(title_match || desc_match || content_match) {
                    continue;
                }

                let snippet_text = match content.as_deref() {
                    Some(content) if content_match => extract_snippet(content, &q),
                    _ => item.description.clone().unwrap_or_default(),
                };

                hits.push(SearchHit {
                    item: item.clone(),
                    section_title: section.title.clone(),
                    snippet: highlight_match(&snippet_text, query.trim()),
                    match_kind: if title_match {
                        MatchKind::Title
                    } else if desc_match {
                        MatchKind::Description
                    } else {
                        MatchKind::Content
                    },
                });
            }
        }
        hits
    }
}

/// Extracts a plain-text window around the first occurrence of `query`.
///
/// The window spans a fixed run before the match and after it; markdown
/// punctuation is stripped, whitespace runs collapse to single spaces, and
/// an ellipsis marks each truncated end.
fn extract_snippet(content: &str, query: &str) -> String {
    let Some(idx) = content.find(query) else {
        return String::new();
    };

    let start = floor_char_boundary(content, idx.saturating_sub(SNIPPET_BEFORE));
    let end = ceil_char_boundary(
        content,
        (idx + query.len() + SNIPPET_AFTER).min(content.len()),
    );

    let window: String = content[start..end]
        .chars()
        .filter(|c| !matches!(c, '#' | '*' | '`' | '_'))
        .collect();
    let collapsed = window
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&collapsed);
    if end < content.len() {
        snippet.push_str("...");
    }
    snippet
}

/// Escapes `text` for HTML and wraps every case-insensitive occurrence of
/// `query` in a highlight marker. The output is safe to treat as markup: all
/// source text is escaped and the only tags present are the markers.
fn highlight_match(text: &str, query: &str) -> String {
    if query.is_empty() {
        return html_escape::encode_text(text).into_owned();
    }

    #[allow(clippy::unwrap_used)] // escaped pattern is always valid
    let re = Regex::new(&format!("(?i){}", regex::escape(query))).unwrap();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        out.push_str(&html_escape::encode_text(&text[last..m.start()]));
        out.push_str("<mark class=\"search-highlight\">");
        out.push_str(&html_escape::encode_text(m.as_str()));
        out.push_str("</mark>");
        last = m.end();
    }
    out.push_str(&html_escape::encode_text(&text[last..]));
    out
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
