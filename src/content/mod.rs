//! Markup parsing: link extraction, text normalization, and main-content
//! scoring.
//!
//! Everything here is synchronous and pure over a parsed document. The
//! `scraper` crate's types are `!Send`, so async callers wrap these
//! functions in `tokio::task::spawn_blocking`.

pub mod extractor;
pub mod readability;

pub use extractor::{extract, Extracted};
pub use readability::select_main_content;
