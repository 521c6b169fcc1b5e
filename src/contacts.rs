//! Contact-page discovery.
//!
//! A one-hop heuristic: any link whose URL mentions a contact-ish keyword
//! is a candidate for the second acquisition pass. Matching is
//! case-insensitive and the main page itself is never a candidate.

/// URL keywords that mark a likely contact page.
pub const CONTACT_KEYWORDS: [&str; 4] = ["contact", "imprint", "impressum", "about"];

/// Filter `links` down to likely contact pages, preserving input order.
///
/// Returns an empty list (never an error) when nothing qualifies.
pub fn find_contact_links(links: &[String], main_url: &str) -> Vec<String> {
    let main = main_url.trim_end_matches('/');
    links
        .iter()
        .filter(|link| link.trim_end_matches('/') != main)
        .filter(|link| {
            let lower = link.to_ascii_lowercase();
            CONTACT_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .cloned()
        .collect()
}
