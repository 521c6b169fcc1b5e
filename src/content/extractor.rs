//! One-pass link extraction and text normalization.
//!
//! Strips script/style/decorative elements, resolves every anchor against
//! the base URL, and renders the remaining markup as normalized text that
//! keeps heading and paragraph structure. Tables are flattened into
//! header/row lines. Links and text always come from the same pass so the
//! caller never sees the two disagree about the document.

use regex::Regex;
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements that never contribute links or text.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "head", "link", "meta",
    "canvas", "object", "embed",
];

/// Output of a single extraction pass.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// Absolute URLs in discovery order, deduplicated.
    pub links: Vec<String>,
    /// Normalized text with markdown-style headings and list markers.
    pub text: String,
}

/// Extract links and normalized text from raw markup in one pass.
pub fn extract(markup: &str, base_url: &str) -> Extracted {
    let document = Html::parse_document(markup);
    Extracted {
        links: extract_links(&document, base_url),
        text: normalize_text(&document),
    }
}

fn extract_links(document: &Html, base_url: &str) -> Vec<String> {
    let anchor_sel = Selector::parse("a[href]").unwrap();
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchor_sel) {
        let href = anchor.value().attr("href").unwrap_or("");
        if let Some(resolved) = resolve_href(base.as_ref(), href) {
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }
    links
}

/// Resolve an anchor href against the base URL.
///
/// Fragment-only hrefs, script pseudo-links, and non-HTTP schemes are
/// skipped; fragments are dropped from resolved URLs so the same page
/// never appears twice under different anchors.
pub(crate) fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let mut resolved = match base {
        Some(b) => b.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn normalize_text(document: &Html) -> String {
    let mut out = String::new();
    let root = document.root_element();
    walk(*root, &mut out);

    let squeezed = Regex::new(r"\n{3,}")
        .unwrap()
        .replace_all(&out, "\n\n")
        .to_string();
    squeezed.trim().to_string()
}

fn walk(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => append_inline(out, &text),
            Node::Element(element) => {
                let name = element.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                match name {
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => heading(child, name, out),
                    "p" | "blockquote" => {
                        block_break(out);
                        walk(child, out);
                        block_break(out);
                    }
                    "li" => {
                        ensure_newline(out);
                        out.push_str("- ");
                        walk(child, out);
                    }
                    "br" => ensure_newline(out),
                    "table" => flatten_table(child, out),
                    "div" | "section" | "article" | "main" | "aside" | "header" | "footer"
                    | "nav" | "ul" | "ol" | "form" | "figure" => {
                        ensure_newline(out);
                        walk(child, out);
                    }
                    _ => walk(child, out),
                }
            }
            _ => {}
        }
    }
}

fn heading(node: NodeRef<'_, Node>, name: &str, out: &mut String) {
    let text = collected_text(node);
    if text.is_empty() {
        return;
    }
    let level: usize = name[1..].parse().unwrap_or(1);
    block_break(out);
    out.push_str(&"#".repeat(level));
    out.push(' ');
    out.push_str(&text);
    block_break(out);
}

fn flatten_table(node: NodeRef<'_, Node>, out: &mut String) {
    let Some(table) = ElementRef::wrap(node) else {
        return;
    };
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("th, td").unwrap();

    block_break(out);
    for row in table.select(&row_sel) {
        let cells: Vec<String> = row
            .select(&cell_sel)
            .map(|cell| collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
            .collect();
        let line = cells.join(" | ");
        if !line.trim().is_empty() {
            out.push_str(&line);
            out.push('\n');
        }
    }
}

fn collected_text(node: NodeRef<'_, Node>) -> String {
    match ElementRef::wrap(node) {
        Some(element) => collapse_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
        None => String::new(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn append_inline(out: &mut String, text: &str) {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
        out.push(' ');
    }
    out.push_str(&collapsed);
}

fn ensure_newline(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn block_break(out: &mut String) {
    ensure_newline(out);
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><head><title>T</title><style>.x{}</style></head><body>
        <script>var x = "ignored";</script>
        <h1>Acme GmbH</h1>
        <p>We build   widgets.</p>
        <ul><li>Fast</li><li>Cheap</li></ul>
        <a href="/about">About us</a>
        <a href="contact.html">Contact</a>
        <a href="#top">Top</a>
        <a href="javascript:void(0)">Menu</a>
        <a href="mailto:info@acme.example">Mail</a>
        <a href="/about">About again</a>
        <table>
          <tr><th>Day</th><th>Hours</th></tr>
          <tr><td>Mon</td><td>9-17</td></tr>
        </table>
        </body></html>"##;

    #[test]
    fn test_links_are_absolute_deduplicated_and_ordered() {
        let extracted = extract(PAGE, "https://acme.example/de/index.html");
        assert_eq!(
            extracted.links,
            vec![
                "https://acme.example/about".to_string(),
                "https://acme.example/de/contact.html".to_string(),
            ]
        );
    }

    #[test]
    fn test_fragment_and_pseudo_hrefs_are_skipped() {
        let base = Url::parse("https://a.example/").unwrap();
        assert_eq!(resolve_href(Some(&base), "#section"), None);
        assert_eq!(resolve_href(Some(&base), "javascript:void(0)"), None);
        assert_eq!(resolve_href(Some(&base), "mailto:x@y.z"), None);
        assert_eq!(
            resolve_href(Some(&base), "/p#frag"),
            Some("https://a.example/p".to_string())
        );
    }

    #[test]
    fn test_text_keeps_structure() {
        let extracted = extract(PAGE, "https://acme.example/");
        let text = &extracted.text;
        assert!(text.contains("# Acme GmbH"));
        assert!(text.contains("We build widgets."));
        assert!(text.contains("- Fast"));
        assert!(text.contains("- Cheap"));
        assert!(!text.contains("ignored"));
        assert!(!text.contains(".x{}"));
    }

    #[test]
    fn test_tables_flatten_to_header_and_row_lines() {
        let extracted = extract(PAGE, "https://acme.example/");
        assert!(extracted.text.contains("Day | Hours"));
        assert!(extracted.text.contains("Mon | 9-17"));
    }

    #[test]
    fn test_empty_document() {
        let extracted = extract("", "https://a.example/");
        assert!(extracted.links.is_empty());
        assert!(extracted.text.is_empty());
    }

    #[test]
    fn test_heading_levels() {
        let extracted = extract(
            "<body><h2>Team</h2><h3>Sales</h3></body>",
            "https://a.example/",
        );
        assert!(extracted.text.contains("## Team"));
        assert!(extracted.text.contains("### Sales"));
    }
}
