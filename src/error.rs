//! Failure taxonomy for per-site pipeline runs.
//!
//! Components use `anyhow` internally; errors are classified into one of
//! three kinds only at the orchestrator's checkpoints. Downstream
//! aggregation counts each kind separately, so the classification is part
//! of the public contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure of one site's pipeline run.
#[derive(Debug, Clone, Error)]
pub enum SiteFailure {
    /// Every acquisition strategy was inapplicable or failed.
    #[error("acquisition failed: {0}")]
    Download(String),
    /// The inference call failed after acquisition succeeded.
    #[error("extraction failed: {0}")]
    Extraction(String),
    /// Anything outside the two checkpoints above.
    #[error("unexpected pipeline error: {0}")]
    Unexpected(String),
}

impl SiteFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Download(_) => FailureKind::Download,
            Self::Extraction(_) => FailureKind::Extraction,
            Self::Unexpected(_) => FailureKind::Unexpected,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Download(d) | Self::Extraction(d) | Self::Unexpected(d) => d,
        }
    }
}

/// Classification of a [`SiteFailure`], serialized into result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Download,
    Extraction,
    Unexpected,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Extraction => write!(f, "extraction"),
            Self::Unexpected => write!(f, "unexpected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            SiteFailure::Download("dns".into()).kind(),
            FailureKind::Download
        );
        assert_eq!(
            SiteFailure::Extraction("quota".into()).kind(),
            FailureKind::Extraction
        );
        assert_eq!(
            SiteFailure::Unexpected("join".into()).kind(),
            FailureKind::Unexpected
        );
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::Download).unwrap();
        assert_eq!(json, r#""download""#);
    }
}
