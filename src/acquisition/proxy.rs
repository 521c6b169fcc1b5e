//! Remote-proxy fetch strategies.
//!
//! The proxy is a text-rendering gateway: `GET {base}/{url}` returns the
//! page already reduced to normalized text. It sees the web from another
//! network position, so it can succeed where every direct attempt failed,
//! which is exactly when it is allowed to run. Proxy results carry no link
//! set; contact discovery is skipped for them.

use super::http_client::HttpClient;
use super::{AcquisitionResult, Method, Protocol, Strategy};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use url::Url;

/// Fetch through the remote text-rendering proxy.
pub struct ProxyStrategy {
    client: HttpClient,
    base_url: String,
    protocol: Protocol,
    timeout_ms: u64,
}

impl ProxyStrategy {
    pub fn secure(client: HttpClient, base_url: String, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            protocol: Protocol::Https,
            timeout_ms,
        }
    }

    pub fn insecure(client: HttpClient, base_url: String, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            protocol: Protocol::Http,
            timeout_ms,
        }
    }

    /// The target URL the proxy should fetch, with this strategy's transport.
    fn target_url(&self, url: &str) -> Result<String> {
        let mut parsed =
            Url::parse(url).with_context(|| format!("invalid acquisition url: {url}"))?;
        let scheme = match self.protocol {
            Protocol::Https => "https",
            Protocol::Http => "http",
        };
        if parsed.set_scheme(scheme).is_err() {
            bail!("cannot set scheme {scheme} on {url}");
        }
        Ok(parsed.to_string())
    }
}

#[async_trait]
impl Strategy for ProxyStrategy {
    fn name(&self) -> &'static str {
        match self.protocol {
            Protocol::Https => "proxy-secure",
            Protocol::Http => "proxy-insecure",
        }
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn method(&self) -> Method {
        Method::RemoteProxy
    }

    fn is_applicable(&self, _url: &str, previous_error: Option<&str>) -> bool {
        // Proxying costs an external round trip; it only runs once the
        // direct strategies have failed and left an error behind.
        previous_error.is_some()
    }

    async fn acquire(&self, url: &str) -> Result<AcquisitionResult> {
        let target = self.target_url(url)?;
        let request_url = format!("{}/{}", self.base_url.trim_end_matches('/'), target);

        let resp = self.client.get(&request_url, self.timeout_ms).await?;
        if resp.status != 200 {
            bail!("proxy returned status {}", resp.status);
        }

        let content = resp.body.trim().to_string();
        if content.is_empty() {
            bail!("proxy returned an empty body");
        }

        Ok(AcquisitionResult {
            size_bytes: content.len(),
            content,
            effective_url: target,
            links: Vec::new(),
            is_normalized_text: true,
            protocol: self.protocol,
            method: Method::RemoteProxy,
        })
    }
}
