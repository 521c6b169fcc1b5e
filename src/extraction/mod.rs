//! Batched contact extraction through the external inference service.
//!
//! Extraction is the expensive step, so requests from many sites coalesce
//! into few outbound calls: the [`batch::BatchQueue`] accumulates items and
//! dispatches them through an [`inference::InferenceClient`] with size- and
//! time-based flush triggers.

pub mod batch;
pub mod inference;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One site's text awaiting extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(rename = "siteId")]
    pub site_id: String,
    pub text: String,
}

/// Structured contact data for one site.
///
/// Immutable once received; sites absent from a response get the empty
/// (but valid) value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedData {
    pub phone_numbers: BTreeSet<String>,
    pub social_links: BTreeSet<String>,
    pub addresses: BTreeSet<String>,
}

impl ExtractedData {
    pub fn is_empty(&self) -> bool {
        self.phone_numbers.is_empty() && self.social_links.is_empty() && self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_data() {
        assert!(ExtractedData::default().is_empty());
        let mut data = ExtractedData::default();
        data.phone_numbers.insert("+49 30 1234".to_string());
        assert!(!data.is_empty());
    }

    #[test]
    fn test_batch_item_wire_casing() {
        let item = BatchItem {
            site_id: "example.com".to_string(),
            text: "body".to_string(),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains(r#""siteId":"example.com""#));
    }
}
