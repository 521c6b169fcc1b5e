//! Layered content acquisition.
//!
//! A page can be acquired four ways: direct fetch over HTTPS or HTTP, or
//! through a remote text-rendering proxy over either transport. Each
//! technique is a [`Strategy`] value; the [`chain::AcquisitionChain`] walks
//! them in fixed priority order and stops at the first success. The cheap
//! path runs first and the escalation decision is driven by the previous
//! attempt's error, never by the original request.

pub mod chain;
pub mod direct;
pub mod http_client;
pub mod proxy;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Transport used by an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
}

/// Technique used by an acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Direct,
    RemoteProxy,
}

/// Content acquired for one URL by one successful strategy attempt.
///
/// The producing strategy tags the result with its `protocol` and `method`
/// so no caller ever has to re-derive the acquisition path by inspecting
/// links or the effective URL.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    /// Raw markup for direct fetches, already-normalized text otherwise.
    pub content: String,
    /// Final URL after redirects.
    pub effective_url: String,
    /// Byte size of the fetched body, used for script-driven-page detection.
    pub size_bytes: usize,
    /// Absolute link set in discovery order, deduplicated.
    pub links: Vec<String>,
    /// Whether `content` is already normalized text rather than markup.
    pub is_normalized_text: bool,
    pub protocol: Protocol,
    pub method: Method,
}

/// Reporting-only projection of how an acquisition concluded. Never drives
/// control flow past the chain itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionOutcome {
    pub success: bool,
    pub protocol: Protocol,
    pub method: Method,
    pub detail: String,
    pub error: Option<String>,
}

/// One technique for retrieving a page's content.
///
/// Strategies are stateless and shared across concurrent invocations.
/// `is_applicable` receives the error text of the *previous* attempt in the
/// chain (None for the first) and decides whether escalating to this
/// strategy is warranted.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn protocol(&self) -> Protocol;
    fn method(&self) -> Method;
    fn is_applicable(&self, url: &str, previous_error: Option<&str>) -> bool;
    async fn acquire(&self, url: &str) -> Result<AcquisitionResult>;
}

/// Whether an error's text indicates a transport-level failure: timeout,
/// connection refused/reset/closed, TLS handshake failure, name resolution
/// failure, or a blocked (403) response. These are the signatures that
/// justify switching transport or target rather than giving up.
pub fn is_transport_error(detail: &str) -> bool {
    let d = detail.to_ascii_lowercase();
    d.contains("timed out")
        || d.contains("timeout")
        || d.contains("connection failed")
        || d.contains("connection refused")
        || d.contains("connection reset")
        || d.contains("connection closed")
        || d.contains("error trying to connect")
        || d.contains("dns error")
        || d.contains("name resolution")
        || d.contains("failed to lookup")
        || d.contains("tls")
        || d.contains("ssl")
        || d.contains("handshake")
        || d.contains("certificate")
        || d.contains("403")
}

/// Exactly two hostname variants for a retryable direct failure: the
/// `www.`-toggled form first, then the original. Same-request alternate
/// targets, not time-delayed retries.
pub fn hostname_variants(host: &str) -> [String; 2] {
    match host.strip_prefix("www.") {
        Some(bare) => [bare.to_string(), host.to_string()],
        None => [format!("www.{host}"), host.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_signatures() {
        assert!(is_transport_error("operation timed out"));
        assert!(is_transport_error("Connection refused (os error 111)"));
        assert!(is_transport_error("dns error: failed to lookup address"));
        assert!(is_transport_error("invalid peer certificate"));
        assert!(is_transport_error("tls handshake eof"));
        assert!(is_transport_error("request blocked with status 403"));
        assert!(!is_transport_error("request returned status 500"));
        assert!(!is_transport_error("invalid response body"));
    }

    #[test]
    fn test_hostname_variants_toggle_www() {
        assert_eq!(
            hostname_variants("example.com"),
            ["www.example.com".to_string(), "example.com".to_string()]
        );
        assert_eq!(
            hostname_variants("www.example.com"),
            ["example.com".to_string(), "www.example.com".to_string()]
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = AcquisitionOutcome {
            success: true,
            protocol: Protocol::Https,
            method: Method::Direct,
            detail: "direct-secure (812 bytes)".to_string(),
            error: None,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("HTTPS"));
        assert!(json.contains("direct"));
    }
}
