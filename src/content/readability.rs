//! Main-content selection for rendered markup.
//!
//! Scores structural elements by text density and content markers, then
//! picks the best-scoring subtree so navigation and boilerplate never reach
//! the extraction step. The weights below are the heuristic's real
//! contract; everything else is plumbing. Only the rendered-DOM path uses
//! this; raw direct fetches go through the extractor untouched.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Ordering;

/// Characters of text per density point.
pub const TEXT_DENSITY_DIVISOR: f64 = 100.0;
/// Density contribution cap.
pub const TEXT_DENSITY_CAP: f64 = 20.0;
pub const PARAGRAPH_WEIGHT: f64 = 2.0;
pub const HEADING_WEIGHT: f64 = 3.0;
pub const IMAGE_WEIGHT: f64 = 1.0;
pub const LIST_WEIGHT: f64 = 2.0;
pub const CONTENT_HINT_BONUS: f64 = 5.0;
pub const BOILERPLATE_PENALTY: f64 = -10.0;
/// Candidates at or below this score are dropped outright.
pub const MIN_CANDIDATE_SCORE: f64 = 10.0;
/// Candidates with this much text or less are dropped outright.
pub const MIN_CANDIDATE_TEXT_LEN: usize = 200;
/// The winner must clear this score, or the caller keeps the full body.
pub const SELECTION_THRESHOLD: f64 = 20.0;
/// How many ancestor levels to inspect for an enclosing content element.
const MAX_ANCESTOR_LEVELS: usize = 3;

const CONTENT_HINT_PATTERN: &str = r"(?i)article|body|content|entry|main|post|story|text";
const BOILERPLATE_PATTERN: &str =
    r"(?i)advert|\bads?\b|banner|comment|cookie|footer|menu|nav|promo|share|sidebar|social|sponsor";

/// A scored content candidate.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub score: f64,
    pub text_len: usize,
    /// Outer HTML of the candidate subtree.
    pub html: String,
}

/// Select the main-content subtree of `markup`, if any candidate qualifies.
///
/// `None` is a valid outcome: the caller falls back to the full body.
pub fn select_main_content(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    rank_candidates(&document)
        .into_iter()
        .next()
        .filter(|candidate| candidate.score > SELECTION_THRESHOLD)
        .map(|candidate| candidate.html)
}

/// Score every structural candidate and return them best-first.
///
/// The sort is stable, so among equal scores the earliest element in
/// document order wins.
pub fn rank_candidates(document: &Html) -> Vec<Candidate> {
    let candidate_sel = Selector::parse("article, main, section, div").unwrap();
    let content_hint = Regex::new(CONTENT_HINT_PATTERN).unwrap();
    let boilerplate = Regex::new(BOILERPLATE_PATTERN).unwrap();

    let mut candidates = Vec::new();
    for element in document.select(&candidate_sel) {
        // An element whose ancestor already reads as content would only
        // double-select the same region.
        if has_content_hint_ancestor(element, &content_hint) {
            continue;
        }
        let (score, text_len) = score_element(element, &content_hint, &boilerplate);
        if score > MIN_CANDIDATE_SCORE && text_len > MIN_CANDIDATE_TEXT_LEN {
            candidates.push(Candidate {
                score,
                text_len,
                html: element.html(),
            });
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    candidates
}

fn score_element(
    element: ElementRef<'_>,
    content_hint: &Regex,
    boilerplate: &Regex,
) -> (f64, usize) {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text_len = text.split_whitespace().collect::<Vec<_>>().join(" ").chars().count();

    let paragraph_sel = Selector::parse("p").unwrap();
    let heading_sel = Selector::parse("h1, h2, h3, h4, h5, h6").unwrap();
    let image_sel = Selector::parse("img").unwrap();
    let list_sel = Selector::parse("ul, ol").unwrap();

    let mut score = (text_len as f64 / TEXT_DENSITY_DIVISOR).min(TEXT_DENSITY_CAP);
    score += element.select(&paragraph_sel).count() as f64 * PARAGRAPH_WEIGHT;
    score += element.select(&heading_sel).count() as f64 * HEADING_WEIGHT;
    score += element.select(&image_sel).count() as f64 * IMAGE_WEIGHT;
    score += element.select(&list_sel).count() as f64 * LIST_WEIGHT;

    let marker = class_id_string(element);
    if content_hint.is_match(&marker) {
        score += CONTENT_HINT_BONUS;
    }
    if boilerplate.is_match(&marker) {
        score += BOILERPLATE_PENALTY;
    }

    (score, text_len)
}

fn has_content_hint_ancestor(element: ElementRef<'_>, content_hint: &Regex) -> bool {
    let mut levels = 0;
    let mut current = element.parent();
    while let Some(node) = current {
        if let Some(ancestor) = ElementRef::wrap(node) {
            levels += 1;
            if levels > MAX_ANCESTOR_LEVELS {
                return false;
            }
            if content_hint.is_match(&class_id_string(ancestor)) {
                return true;
            }
        }
        current = node.parent();
    }
    false
}

fn class_id_string(element: ElementRef<'_>) -> String {
    let classes: Vec<&str> = element.value().classes().collect();
    let id = element.value().id().unwrap_or("");
    format!("{} {}", classes.join(" "), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_page() -> String {
        let paragraphs: String = (0..40)
            .map(|i| format!("<p>Paragraph {i} with enough words to carry real content.</p>"))
            .collect();
        format!(
            r#"<html><body>
            <div class="sidebar nav">
              <ul><li><a href="/a">Home</a></li><li><a href="/b">Products</a></li></ul>
              Some repeated navigation text that pads this element out a little bit more.
            </div>
            <article>{paragraphs}</article>
            </body></html>"#
        )
    }

    #[test]
    fn test_selects_article_over_nav_sidebar() {
        let selected = select_main_content(&article_page()).expect("article should qualify");
        assert!(selected.contains("Paragraph 0"));
        assert!(selected.contains("Paragraph 39"));
        assert!(!selected.contains("sidebar"));
    }

    #[test]
    fn test_boilerplate_marker_is_penalized() {
        let document = Html::parse_document(&article_page());
        let ranked = rank_candidates(&document);
        assert!(!ranked.is_empty());
        // The nav div either failed to qualify or ranks strictly below
        assert!(ranked[0].html.contains("Paragraph 0"));
        for candidate in &ranked[1..] {
            assert!(candidate.score < ranked[0].score);
        }
    }

    #[test]
    fn test_no_candidate_on_sparse_page() {
        let markup = "<html><body><div>short</div></body></html>";
        assert!(select_main_content(markup).is_none());
    }

    #[test]
    fn test_nested_candidate_inside_content_element_is_discarded() {
        let inner: String = (0..30)
            .map(|i| format!("<p>Inner paragraph {i} with a reasonable amount of text.</p>"))
            .collect();
        let markup = format!(
            r#"<body><div class="content"><div>{inner}</div></div></body>"#
        );
        let document = Html::parse_document(&markup);
        let ranked = rank_candidates(&document);
        // Only the outer content div survives; the nested div is discarded
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].html.starts_with(r#"<div class="content">"#));
    }

    #[test]
    fn test_first_highest_wins_on_ties() {
        let block: String = (0..25)
            .map(|i| format!("<p>Tie paragraph {i} with identical shape and weight.</p>"))
            .collect();
        let markup = format!(
            "<body><section id=\"one\">{block}</section><section id=\"two\">{block}</section></body>"
        );
        let document = Html::parse_document(&markup);
        let ranked = rank_candidates(&document);
        assert!(ranked.len() >= 2);
        assert!(ranked[0].html.contains("id=\"one\""));
    }
}
