//! Markdown rendering to sanitized, annotated HTML.
//!
//! Rendering runs in stages:
//!
//! 1. Markdown is parsed with pulldown-cmark; every heading is rewritten to
//!    carry a deterministic `id` derived from its text and a leading `§`
//!    self-link anchor. Table-of-contents rows are collected on the way for
//!    the top three heading levels.
//! 2. The rendered HTML gets search-term highlighting applied to text nodes
//!    only (never inside tags), then custom `[[icon:...]]` directives are
//!    substituted with icon marker elements.
//! 3. The result is passed through an HTML sanitizer. Content comes from a
//!    remote repository and is untrusted; skipping this step would be an XSS
//!    hole, so the sanitizer is not optional or configurable.

use crate::types::TocEntry;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

/// Inline fragment shown in place of a page whose fetch failed.
pub const ERROR_PLACEHOLDER_HTML: &str = "<p class=\"error-text\">Error loading content.</p>";

/// Minimum highlight term length; shorter terms are ignored.
const MIN_HIGHLIGHT_LEN: usize = 2;

#[allow(clippy::unwrap_used)]
static ICON_DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\[icon:([a-z0-9_]+)(?:\.([a-z]+))?\]\]").unwrap());

#[allow(clippy::unwrap_used)]
static ANY_ICON_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[\[icon:.*?\]\]|icon:[a-z0-9_.-]+").unwrap());

#[allow(clippy::unwrap_used)]
static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

#[allow(clippy::unwrap_used)]
static NON_SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());

#[allow(clippy::unwrap_used)]
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A rendered page: sanitized HTML plus its table of contents.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Renders markdown to sanitized HTML with heading anchors, icon
/// substitution, and optional search-term highlighting.
#[must_use]
pub fn render(markdown: &str, highlight_term: Option<&str>) -> Rendered {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut events: Vec<Event> = Vec::new();
    let mut toc = Vec::new();

    let mut parser = Parser::new_ext(markdown, options);
    while let Some(event) = parser.next() {
        if let Event::Start(Tag::Heading { level, .. }) = event {
            let level = level as u8;
            let mut inner: Vec<Event> = Vec::new();
            let mut text = String::new();

            for inner_event in parser.by_ref() {
                match inner_event {
                    Event::End(TagEnd::Heading(_)) => break,
                    other => {
                        // Inline HTML is excluded from the id/ToC text; only
                        // visible text and code contribute
                        match &other {
                            Event::Text(t) | Event::Code(t) => text.push_str(t),
                            _ => {},
                        }
                        inner.push(other);
                    },
                }
            }

            let id = heading_id(&text);
            if id.is_empty() {
                events.push(Event::Html(format!("<h{level}>").into()));
            } else {
                events.push(Event::Html(
                    format!(
                        "<h{level} id=\"{id}\"><a class=\"heading-anchor\" href=\"#{id}\" aria-label=\"Link to section\">\u{a7}</a>"
                    )
                    .into(),
                ));
                if level <= 3 {
                    toc.push(TocEntry {
                        id,
                        text: toc_text(&text),
                        level,
                    });
                }
            }
            events.extend(inner);
            events.push(Event::Html(format!("</h{level}>\n").into()));
        } else {
            events.push(event);
        }
    }

    let mut html_out = String::new();
    html::push_html(&mut html_out, events.into_iter());

    if let Some(term) = highlight_term {
        html_out = highlight_content(&html_out, term);
    }
    html_out = process_custom_icons(&html_out);

    Rendered {
        html: sanitize(&html_out),
        toc,
    }
}

/// Derives the deterministic, stable heading id from heading text.
///
/// Order matters and mirrors the anchor contract: icon directives out
/// first, then lowercase, strip tags, strip punctuation, trim, hyphenate.
#[must_use]
pub fn heading_id(text: &str) -> String {
    let stripped = ANY_ICON_TOKEN_RE.replace_all(text, "");
    let lowered = stripped.to_lowercase();
    let untagged = HTML_TAG_RE.replace_all(&lowered, "");
    let cleaned = NON_SLUG_RE.replace_all(&untagged, "");
    WHITESPACE_RE
        .replace_all(cleaned.trim(), "-")
        .into_owned()
}

/// Heading text as shown in the table of contents: icon decoration removed,
/// whitespace normalized, original casing kept.
fn toc_text(text: &str) -> String {
    let stripped = ANY_ICON_TOKEN_RE.replace_all(text, "");
    WHITESPACE_RE
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// Replaces `[[icon:name]]` / `[[icon:name.color]]` directives in rendered
/// HTML with icon marker elements. Runs on HTML, not markdown source, and
/// touches only the directive text itself, so surrounding tag structure is
/// preserved.
#[must_use]
pub fn process_custom_icons(html: &str) -> String {
    ICON_DIRECTIVE_RE
        .replace_all(html, |caps: &regex::Captures| {
            let name = &caps[1];
            let class = caps
                .get(2)
                .map_or_else(String::new, |color| format!(" {}", color.as_str()));
            format!("<span class=\"material-icons md-icon{class}\">{name}</span>")
        })
        .into_owned()
}

/// Wraps case-insensitive occurrences of `term` in a highlight marker,
/// applied only within text nodes.
///
/// The HTML is split on tag boundaries and the highlight regex runs on the
/// non-tag segments alone; wrapping inside an attribute value or a tag name
/// would corrupt the markup.
#[must_use]
pub fn highlight_content(html: &str, term: &str) -> String {
    if term.len() < MIN_HIGHLIGHT_LEN {
        return html.to_string();
    }

    #[allow(clippy::unwrap_used)] // escaped term is always a valid pattern
    let term_re = Regex::new(&format!("(?i)({})", regex::escape(term))).unwrap();

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for tag in HTML_TAG_RE.find_iter(html) {
        let segment = &html[last..tag.start()];
        out.push_str(&term_re.replace_all(segment, "<mark class=\"content-highlight\">$1</mark>"));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&term_re.replace_all(&html[last..], "<mark class=\"content-highlight\">$1</mark>"));
    out
}

/// Sanitizes rendered HTML before it may be trusted as renderable markup.
///
/// Allows the pipeline's own annotations through: heading ids, the anchor
/// link, icon spans, and highlight marks. Everything else falls under the
/// sanitizer's conservative defaults (scripts, event handlers, and unknown
/// schemes are dropped).
#[must_use]
pub fn sanitize(html: &str) -> String {
    ammonia::Builder::default()
        .add_tags(["mark", "span"])
        .add_generic_attributes(["class"])
        .add_tag_attributes("h1", ["id"])
        .add_tag_attributes("h2", ["id"])
        .add_tag_attributes("h3", ["id"])
        .add_tag_attributes("h4", ["id"])
        .add_tag_attributes("h5", ["id"])
        .add_tag_attributes("h6", ["id"])
        .add_tag_attributes("a", ["aria-label"])
        .clean(html)
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_id_examples() {
        assert_eq!(heading_id("Hello, World! [[icon:star]]"), "hello-world");
        assert_eq!(heading_id("Getting Started"), "getting-started");
        assert_eq!(heading_id("FAQ & Tips"), "faq-tips");
        assert_eq!(heading_id("[[icon:gear.blue]] Settings"), "settings");
        assert_eq!(heading_id("   "), "");
    }

    #[test]
    fn test_render_heading_anchor_and_id() {
        let rendered = render("## Hello, World! [[icon:star]]", None);

        assert!(rendered.html.contains("<h2 id=\"hello-world\">"));
        assert!(rendered.html.contains("href=\"#hello-world\""));
        assert!(rendered.html.contains("\u{a7}"));
        assert_eq!(rendered.toc.len(), 1);
        assert_eq!(rendered.toc[0].id, "hello-world");
        assert_eq!(rendered.toc[0].level, 2);
    }

    #[test]
    fn test_toc_covers_top_three_levels_in_order() {
        let rendered = render(
            "# One\n\n## Two\n\ntext\n\n### Three\n\n#### Four\n\n## Two-b\n",
            None,
        );

        let levels: Vec<_> = rendered.toc.iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![1, 2, 3, 2]);
        let ids: Vec<_> = rendered.toc.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["one", "two", "three", "two-b"]);
        // h4 is rendered but not in the ToC
        assert!(rendered.html.contains("<h4 id=\"four\">"));
    }

    #[test]
    fn test_heading_without_usable_id_is_skipped() {
        let rendered = render("## !!!\n\nbody\n", None);
        assert!(rendered.toc.is_empty());
        assert!(rendered.html.contains("<h2>"));
        assert!(!rendered.html.contains("heading-anchor"));
    }

    #[test]
    fn test_toc_text_strips_icon_decoration() {
        let rendered = render("## [[icon:rocket]] Launch Guide", None);
        assert_eq!(rendered.toc[0].text, "Launch Guide");
    }

    #[test]
    fn test_custom_icon_substitution() {
        let html = process_custom_icons("<p>[[icon:cloud]] and [[icon:sync.green]]</p>");
        assert_eq!(
            html,
            "<p><span class=\"material-icons md-icon\">cloud</span> and \
             <span class=\"material-icons md-icon green\">sync</span></p>"
        );
    }

    #[test]
    fn test_icon_substitution_survives_sanitizer() {
        let rendered = render("Status: [[icon:check.green]]", None);
        assert!(rendered
            .html
            .contains("<span class=\"material-icons md-icon green\">check</span>"));
    }

    #[test]
    fn test_highlight_only_in_text_nodes() {
        let html = "<a href=\"https://fox.example\">the fox</a>";
        let highlighted = highlight_content(html, "fox");

        // Attribute untouched, text node wrapped
        assert!(highlighted.contains("href=\"https://fox.example\""));
        assert!(highlighted.contains("the <mark class=\"content-highlight\">fox</mark>"));
    }

    #[test]
    fn test_highlight_case_insensitive_preserves_case() {
        let highlighted = highlight_content("<p>Fox and fox</p>", "fox");
        assert!(highlighted.contains("<mark class=\"content-highlight\">Fox</mark>"));
        assert!(highlighted.contains("<mark class=\"content-highlight\">fox</mark>"));
    }

    #[test]
    fn test_highlight_short_term_is_noop() {
        let html = "<p>a</p>";
        assert_eq!(highlight_content(html, "a"), html);
    }

    #[test]
    fn test_highlight_term_with_regex_metacharacters() {
        let highlighted = highlight_content("<p>1+1 equals</p>", "1+1");
        assert!(highlighted.contains("<mark class=\"content-highlight\">1+1</mark>"));
    }

    #[test]
    fn test_render_applies_highlight_term() {
        let rendered = render("the quick brown fox", Some("fox"));
        assert!(rendered
            .html
            .contains("<mark class=\"content-highlight\">fox</mark>"));
    }

    #[test]
    fn test_sanitizer_strips_scripts() {
        let rendered = render(
            "hello <script>alert('xss')</script><img src=x onerror=alert(1)>",
            None,
        );
        assert!(!rendered.html.contains("<script"));
        assert!(!rendered.html.contains("onerror"));
        assert!(rendered.html.contains("hello"));
    }

    #[test]
    fn test_sanitizer_keeps_pipeline_annotations() {
        let rendered = render("## Keep Me\n\n[[icon:star]] body", None);
        assert!(rendered.html.contains("id=\"keep-me\""));
        assert!(rendered.html.contains("class=\"heading-anchor\""));
        assert!(rendered.html.contains("material-icons"));
    }

    #[test]
    fn test_code_blocks_render() {
        let rendered = render("```bash\ndocshelf-index-build public/docs\n```", None);
        assert!(rendered.html.contains("<pre>"));
        assert!(rendered.html.contains("docshelf-index-build public/docs"));
    }

    #[test]
    fn test_error_placeholder_is_already_safe() {
        assert_eq!(sanitize(ERROR_PLACEHOLDER_HTML), ERROR_PLACEHOLDER_HTML);
    }
}
