//! Direct fetch strategies (secure and insecure transport).
//!
//! The secure variant always applies and runs first. The insecure variant
//! only applies when the previous attempt's error looks like a transport
//! failure: a site that times out or refuses TLS may still answer plain
//! HTTP. Both share one strategy-local retry: on a retryable error the
//! hostname's `www.` prefix is toggled and each of the two variants is
//! attempted once, with no backoff.

use super::http_client::HttpClient;
use super::{
    hostname_variants, is_transport_error, AcquisitionResult, Method, Protocol, Strategy,
};
use crate::content;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use url::Url;

/// Direct HTTP(S) fetch with hostname-variant retry.
pub struct DirectStrategy {
    client: HttpClient,
    protocol: Protocol,
    timeout_ms: u64,
}

impl DirectStrategy {
    pub fn secure(client: HttpClient, timeout_ms: u64) -> Self {
        Self {
            client,
            protocol: Protocol::Https,
            timeout_ms,
        }
    }

    pub fn insecure(client: HttpClient, timeout_ms: u64) -> Self {
        Self {
            client,
            protocol: Protocol::Http,
            timeout_ms,
        }
    }

    fn with_protocol(&self, url: &str) -> Result<Url> {
        let mut parsed =
            Url::parse(url).with_context(|| format!("invalid acquisition url: {url}"))?;
        let scheme = match self.protocol {
            Protocol::Https => "https",
            Protocol::Http => "http",
        };
        if parsed.set_scheme(scheme).is_err() {
            bail!("cannot set scheme {scheme} on {url}");
        }
        Ok(parsed)
    }

    async fn fetch_and_parse(&self, url: &str) -> Result<AcquisitionResult> {
        let resp = self.client.get(url, self.timeout_ms).await?;

        if resp.status == 403 {
            bail!("request blocked with status 403");
        }
        if !(200..300).contains(&resp.status) {
            bail!("request returned status {}", resp.status);
        }

        let size_bytes = resp.body.len();
        let effective_url = resp.final_url.clone();
        let body = resp.body;

        // scraper types are !Send, so parsing runs on the blocking pool.
        let markup = body.clone();
        let base = effective_url.clone();
        let links = tokio::task::spawn_blocking(move || content::extract(&markup, &base).links)
            .await
            .context("link extraction task failed")?;

        Ok(AcquisitionResult {
            content: body,
            effective_url,
            size_bytes,
            links,
            is_normalized_text: false,
            protocol: self.protocol,
            method: Method::Direct,
        })
    }
}

#[async_trait]
impl Strategy for DirectStrategy {
    fn name(&self) -> &'static str {
        match self.protocol {
            Protocol::Https => "direct-secure",
            Protocol::Http => "direct-insecure",
        }
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn method(&self) -> Method {
        Method::Direct
    }

    fn is_applicable(&self, _url: &str, previous_error: Option<&str>) -> bool {
        match self.protocol {
            // The secure fetch is always worth trying first.
            Protocol::Https => true,
            // Downgrading transport is only warranted after a transport
            // failure, not after e.g. a server-side 500.
            Protocol::Http => previous_error.map(is_transport_error).unwrap_or(false),
        }
    }

    async fn acquire(&self, url: &str) -> Result<AcquisitionResult> {
        let target = self.with_protocol(url)?;

        let first_error = match self.fetch_and_parse(target.as_str()).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !is_transport_error(&format!("{first_error:#}")) {
            return Err(first_error);
        }

        // Alternate-target attempts only make sense for named hosts.
        let host = match target.host() {
            Some(url::Host::Domain(domain)) => domain.to_string(),
            _ => return Err(first_error),
        };

        let mut last_error = first_error;
        for variant in hostname_variants(&host) {
            let mut alt = target.clone();
            if alt.set_host(Some(&variant)).is_err() {
                continue;
            }
            debug!("{}: retrying {url} as {alt}", self.name());
            match self.fetch_and_parse(alt.as_str()).await {
                Ok(result) => return Ok(result),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_protocol_rewrite() {
        let strategy = DirectStrategy::secure(HttpClient::new(1000), 1000);
        let rewritten = strategy.with_protocol("http://example.com/page").unwrap();
        assert_eq!(rewritten.as_str(), "https://example.com/page");

        let strategy = DirectStrategy::insecure(HttpClient::new(1000), 1000);
        let rewritten = strategy.with_protocol("https://example.com/").unwrap();
        assert_eq!(rewritten.as_str(), "http://example.com/");
    }

    #[test]
    fn test_applicability() {
        let secure = DirectStrategy::secure(HttpClient::new(1000), 1000);
        assert!(secure.is_applicable("https://a.com", None));

        let insecure = DirectStrategy::insecure(HttpClient::new(1000), 1000);
        assert!(!insecure.is_applicable("https://a.com", None));
        assert!(!insecure.is_applicable("https://a.com", Some("request returned status 500")));
        assert!(insecure.is_applicable("https://a.com", Some("operation timed out")));
        assert!(insecure.is_applicable("https://a.com", Some("request blocked with status 403")));
    }

    #[tokio::test]
    async fn test_insecure_fetch_extracts_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><body><p>Hello</p><a href="/contact">Contact</a></body></html>"#,
            ))
            .mount(&server)
            .await;

        let strategy = DirectStrategy::insecure(HttpClient::new(5_000), 5_000);
        let result = strategy.acquire(&server.uri()).await.unwrap();

        assert!(!result.is_normalized_text);
        assert_eq!(result.method, Method::Direct);
        assert_eq!(result.protocol, Protocol::Http);
        assert!(result.content.contains("<p>Hello</p>"));
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].ends_with("/contact"));
    }

    #[tokio::test]
    async fn test_blocked_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let strategy = DirectStrategy::insecure(HttpClient::new(5_000), 5_000);
        let err = strategy.acquire(&server.uri()).await.unwrap_err();
        assert!(format!("{err:#}").contains("403"));
    }
}
