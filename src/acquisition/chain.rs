//! Ordered fallback chain over acquisition strategies.
//!
//! Strategies run in fixed priority order: direct-secure, direct-insecure,
//! proxy-secure, proxy-insecure. Each strategy's applicability check
//! receives the error of the *previous* attempt; a strategy that declines
//! is skipped without being invoked. The chain short-circuits on the first
//! success and fails with the last observed error once every strategy has
//! been skipped or has failed.

use super::direct::DirectStrategy;
use super::http_client::HttpClient;
use super::proxy::ProxyStrategy;
use super::{AcquisitionOutcome, AcquisitionResult, Strategy};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// The ordered strategy sequence. Built once, read-only afterwards.
pub struct AcquisitionChain {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl AcquisitionChain {
    /// Build a chain from an explicit strategy sequence.
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// The standard four-strategy chain.
    pub fn standard(
        client: HttpClient,
        proxy_base_url: &str,
        direct_timeout_ms: u64,
        proxy_timeout_ms: u64,
    ) -> Self {
        Self::new(vec![
            Arc::new(DirectStrategy::secure(client.clone(), direct_timeout_ms)),
            Arc::new(DirectStrategy::insecure(client.clone(), direct_timeout_ms)),
            Arc::new(ProxyStrategy::secure(
                client.clone(),
                proxy_base_url.to_string(),
                proxy_timeout_ms,
            )),
            Arc::new(ProxyStrategy::insecure(
                client,
                proxy_base_url.to_string(),
                proxy_timeout_ms,
            )),
        ])
    }

    /// Acquire `url`, escalating through the strategy sequence.
    pub async fn execute(&self, url: &str) -> Result<(AcquisitionResult, AcquisitionOutcome)> {
        let mut previous_error: Option<String> = None;

        for strategy in &self.strategies {
            if !strategy.is_applicable(url, previous_error.as_deref()) {
                debug!("{}: not applicable for {url}", strategy.name());
                continue;
            }

            match strategy.acquire(url).await {
                Ok(result) => {
                    let outcome = AcquisitionOutcome {
                        success: true,
                        protocol: strategy.protocol(),
                        method: strategy.method(),
                        detail: format!("{} ({} bytes)", strategy.name(), result.size_bytes),
                        error: None,
                    };
                    return Ok((result, outcome));
                }
                Err(e) => {
                    let detail = format!("{e:#}");
                    warn!("{}: {url}: {detail}", strategy.name());
                    previous_error = Some(detail);
                }
            }
        }

        match previous_error {
            Some(last) => bail!("all acquisition strategies exhausted for {url}: {last}"),
            None => bail!("no acquisition strategy applicable for {url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{Method, Protocol};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted strategy that records the previous-error values it was
    /// offered and whether it was invoked.
    struct ScriptedStrategy {
        name: &'static str,
        applicable_when: fn(Option<&str>) -> bool,
        outcome: Result<usize, &'static str>,
        seen_previous: Mutex<Vec<Option<String>>>,
        invocations: Mutex<usize>,
    }

    impl ScriptedStrategy {
        fn new(
            name: &'static str,
            applicable_when: fn(Option<&str>) -> bool,
            outcome: Result<usize, &'static str>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                applicable_when,
                outcome,
                seen_previous: Mutex::new(Vec::new()),
                invocations: Mutex::new(0),
            })
        }

        fn result(size_bytes: usize) -> AcquisitionResult {
            AcquisitionResult {
                content: "content".to_string(),
                effective_url: "https://example.com/".to_string(),
                size_bytes,
                links: Vec::new(),
                is_normalized_text: true,
                protocol: Protocol::Https,
                method: Method::Direct,
            }
        }
    }

    #[async_trait]
    impl Strategy for ScriptedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }
        fn protocol(&self) -> Protocol {
            Protocol::Https
        }
        fn method(&self) -> Method {
            Method::Direct
        }
        fn is_applicable(&self, _url: &str, previous_error: Option<&str>) -> bool {
            self.seen_previous
                .lock()
                .unwrap()
                .push(previous_error.map(str::to_string));
            (self.applicable_when)(previous_error)
        }
        async fn acquire(&self, _url: &str) -> Result<AcquisitionResult> {
            *self.invocations.lock().unwrap() += 1;
            match self.outcome {
                Ok(size) => Ok(Self::result(size)),
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    #[tokio::test]
    async fn test_short_circuit_on_first_success() {
        let first = ScriptedStrategy::new("first", |_| true, Ok(100));
        let second = ScriptedStrategy::new("second", |_| true, Ok(200));
        let chain = AcquisitionChain::new(vec![first.clone(), second.clone()]);

        let (result, outcome) = chain.execute("https://example.com").await.unwrap();
        assert_eq!(result.size_bytes, 100);
        assert!(outcome.success);
        assert_eq!(*first.invocations.lock().unwrap(), 1);
        // The second strategy was never consulted at all
        assert_eq!(*second.invocations.lock().unwrap(), 0);
        assert!(second.seen_previous.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inapplicable_strategy_is_never_invoked() {
        let first = ScriptedStrategy::new("first", |_| true, Err("timed out"));
        let skipped = ScriptedStrategy::new("skipped", |_| false, Ok(1));
        let last = ScriptedStrategy::new("last", |prev| prev.is_some(), Ok(300));
        let chain = AcquisitionChain::new(vec![first, skipped.clone(), last.clone()]);

        let (result, _) = chain.execute("https://example.com").await.unwrap();
        assert_eq!(result.size_bytes, 300);
        assert_eq!(*skipped.invocations.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_applicability_sees_previous_error_not_original() {
        let first = ScriptedStrategy::new("first", |_| true, Err("first failed"));
        let second =
            ScriptedStrategy::new("second", |prev| prev.is_some(), Err("second failed"));
        let third = ScriptedStrategy::new("third", |prev| prev.is_some(), Ok(1));
        let chain = AcquisitionChain::new(vec![first, second.clone(), third.clone()]);

        chain.execute("https://example.com").await.unwrap();

        let second_saw = second.seen_previous.lock().unwrap();
        assert_eq!(second_saw.as_slice(), &[Some("first failed".to_string())]);
        let third_saw = third.seen_previous.lock().unwrap();
        assert_eq!(third_saw.as_slice(), &[Some("second failed".to_string())]);
    }

    #[tokio::test]
    async fn test_exhaustion_preserves_last_error() {
        let first = ScriptedStrategy::new("first", |_| true, Err("timed out"));
        let second = ScriptedStrategy::new("second", |prev| prev.is_some(), Err("proxy 502"));
        let chain = AcquisitionChain::new(vec![first, second]);

        let err = chain.execute("https://example.com").await.unwrap_err();
        let detail = format!("{err:#}");
        assert!(detail.contains("exhausted"));
        assert!(detail.contains("proxy 502"));
    }

    #[tokio::test]
    async fn test_no_applicable_strategy() {
        let only = ScriptedStrategy::new("only", |_| false, Ok(1));
        let chain = AcquisitionChain::new(vec![only]);
        let err = chain.execute("https://example.com").await.unwrap_err();
        assert!(format!("{err:#}").contains("no acquisition strategy applicable"));
    }
}
