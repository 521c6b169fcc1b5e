//! Per-site pipeline: acquire, render if needed, discover contact pages,
//! and hand the combined text to the batch queue.
//!
//! Stages run strictly in sequence. Failure is classified at exactly two
//! checkpoints, acquisition and extraction; anything else that escapes a
//! stage is recorded as unexpected. A site that fails still produces a
//! complete report with empty data, so one bad site never aborts a run.

use super::{normalize_input, site_id_for, SiteRecord, SiteReport, Stage};
use crate::acquisition::chain::AcquisitionChain;
use crate::acquisition::AcquisitionResult;
use crate::config::Config;
use crate::contacts::find_contact_links;
use crate::content;
use crate::error::SiteFailure;
use crate::events::{self, EventSender, PipelineEvent};
use crate::extraction::batch::BatchQueue;
use crate::extraction::ExtractedData;
use crate::renderer::fallback::{acquire_rendered, needs_rendering, RenderOptions};
use crate::renderer::Renderer;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives one site at a time through the full pipeline. Stateless across
/// sites; a single instance is shared by every worker.
pub struct SitePipeline {
    chain: AcquisitionChain,
    renderer: Arc<dyn Renderer>,
    queue: BatchQueue,
    config: Arc<Config>,
    events: Option<EventSender>,
}

impl SitePipeline {
    pub fn new(
        chain: AcquisitionChain,
        renderer: Arc<dyn Renderer>,
        queue: BatchQueue,
        config: Arc<Config>,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            chain,
            renderer,
            queue,
            config,
            events,
        }
    }

    /// Process one raw input identifier to completion.
    pub async fn process(&self, raw_input: &str) -> SiteReport {
        let url = normalize_input(raw_input);
        let site_id = site_id_for(&url);
        let mut record = SiteRecord::new();

        events::emit(
            &self.events,
            PipelineEvent::SiteStarted {
                site_id: site_id.clone(),
                url: url.clone(),
            },
        );

        match self.run_stages(&url, &site_id, &mut record).await {
            Ok(data) => {
                record.advance(Stage::Done);
                events::emit(
                    &self.events,
                    PipelineEvent::SiteCompleted {
                        site_id: site_id.clone(),
                        phone_numbers: data.phone_numbers.len(),
                        social_links: data.social_links.len(),
                        addresses: data.addresses.len(),
                        elapsed_ms: record.total_ms,
                    },
                );
                SiteReport {
                    site_id,
                    url,
                    data,
                    failure: None,
                    record,
                }
            }
            Err(failure) => {
                record.advance(Stage::Failed);
                events::emit(
                    &self.events,
                    PipelineEvent::SiteFailed {
                        site_id: site_id.clone(),
                        kind: failure.kind(),
                        error: failure.detail().to_string(),
                    },
                );
                SiteReport {
                    site_id,
                    url,
                    data: ExtractedData::default(),
                    failure: Some((&failure).into()),
                    record,
                }
            }
        }
    }

    async fn run_stages(
        &self,
        url: &str,
        site_id: &str,
        record: &mut SiteRecord,
    ) -> Result<ExtractedData, SiteFailure> {
        // Checkpoint 1: acquisition. Extraction is never attempted
        // without content.
        record.advance(Stage::Acquiring);
        let (mut page, outcome) = self
            .chain
            .execute(url)
            .await
            .map_err(|e| SiteFailure::Download(format!("{e:#}")))?;
        events::emit(
            &self.events,
            PipelineEvent::SiteAcquired {
                site_id: site_id.to_string(),
                strategy: outcome.detail.clone(),
                size_bytes: page.size_bytes,
            },
        );
        record.acquisition = Some(outcome);

        // A sub-threshold result is a local condition to fix by rendering,
        // not an acquisition failure.
        let mut rendered = false;
        if needs_rendering(&page, self.config.spa_threshold_bytes) {
            record.advance(Stage::RenderingFallback);
            let options = RenderOptions::from(self.config.as_ref());
            match acquire_rendered(self.renderer.as_ref(), &page.effective_url, &options).await {
                Ok(re_acquired) => {
                    events::emit(
                        &self.events,
                        PipelineEvent::SiteRendered {
                            site_id: site_id.to_string(),
                            size_bytes: re_acquired.size_bytes,
                        },
                    );
                    page = re_acquired;
                    rendered = true;
                }
                Err(e) => {
                    warn!("rendering fallback failed for {url}, keeping direct result: {e:#}");
                }
            }
            record.rendered = rendered;
        }

        record.advance(Stage::LocatingContacts);
        let main_text = self
            .finalize_text(&page)
            .await
            .map_err(|e| SiteFailure::Unexpected(format!("{e:#}")))?;
        let contact_links = find_contact_links(&page.links, &page.effective_url);
        events::emit(
            &self.events,
            PipelineEvent::ContactLinksFound {
                site_id: site_id.to_string(),
                count: contact_links.len(),
            },
        );
        record.contact_links = contact_links.clone();

        // Second pass over discovered contact pages. One link's failure
        // never aborts the others.
        record.advance(Stage::AcquiringContacts);
        let mut combined = main_text;
        for link in &contact_links {
            match self.acquire_contact_page(link, rendered).await {
                Ok(sub_page) => match self.finalize_text(&sub_page).await {
                    Ok(text) if !text.is_empty() => {
                        combined.push_str(&format!("\n\n=== {link} ===\n{text}"));
                        record.contact_pages_fetched += 1;
                    }
                    Ok(_) => {}
                    Err(e) => debug!("contact page normalization failed for {link}: {e:#}"),
                },
                Err(e) => debug!("contact page fetch failed for {link}: {e:#}"),
            }
        }

        // Checkpoint 2: extraction.
        record.advance(Stage::Extracting);
        self.queue
            .enqueue(site_id, combined)
            .await
            .map_err(|e| SiteFailure::Extraction(e.to_string()))
    }

    /// Fetch a contact page the same way the main page was fetched: the
    /// rendering path when the main page needed it, the chain otherwise.
    async fn acquire_contact_page(
        &self,
        link: &str,
        rendered: bool,
    ) -> Result<AcquisitionResult> {
        if rendered {
            let options = RenderOptions::from(self.config.as_ref());
            acquire_rendered(self.renderer.as_ref(), link, &options).await
        } else {
            self.chain.execute(link).await.map(|(result, _)| result)
        }
    }

    /// Reduce an acquisition result to the text sent for extraction.
    async fn finalize_text(&self, result: &AcquisitionResult) -> Result<String> {
        if result.is_normalized_text {
            return Ok(result.content.trim().to_string());
        }
        let markup = result.content.clone();
        let base = result.effective_url.clone();
        let extracted = tokio::task::spawn_blocking(move || content::extract(&markup, &base))
            .await
            .context("content normalization task failed")?;
        Ok(extracted.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{Method, Protocol, Strategy};
    use crate::config::BatchConfig;
    use crate::error::FailureKind;
    use crate::extraction::inference::InferenceClient;
    use crate::extraction::BatchItem;
    use crate::renderer::NoopRenderer;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Strategy returning a fixed result for every URL.
    struct StaticStrategy {
        outcome: Result<AcquisitionResult, &'static str>,
    }

    #[async_trait]
    impl Strategy for StaticStrategy {
        fn name(&self) -> &'static str {
            "static"
        }
        fn protocol(&self) -> Protocol {
            Protocol::Https
        }
        fn method(&self) -> Method {
            Method::Direct
        }
        fn is_applicable(&self, _url: &str, _previous_error: Option<&str>) -> bool {
            true
        }
        async fn acquire(&self, url: &str) -> Result<AcquisitionResult> {
            match &self.outcome {
                Ok(result) => {
                    let mut result = result.clone();
                    result.effective_url = url.to_string();
                    Ok(result)
                }
                Err(msg) => bail!("{msg}"),
            }
        }
    }

    /// Inference client returning a fixed map and counting calls.
    struct StaticClient {
        map: HashMap<String, ExtractedData>,
        fail_with: Option<&'static str>,
        calls: Mutex<Vec<Vec<BatchItem>>>,
    }

    #[async_trait]
    impl InferenceClient for StaticClient {
        async fn extract_batch(
            &self,
            items: &[BatchItem],
        ) -> Result<HashMap<String, ExtractedData>> {
            self.calls.lock().unwrap().push(items.to_vec());
            match self.fail_with {
                Some(msg) => bail!("{msg}"),
                None => Ok(self.map.clone()),
            }
        }
    }

    fn page_result(size_bytes: usize, links: &[&str]) -> AcquisitionResult {
        AcquisitionResult {
            content: "# Welcome\n\nCall us at +1 555 0100.".to_string(),
            effective_url: String::new(),
            size_bytes,
            links: links.iter().map(|s| s.to_string()).collect(),
            is_normalized_text: true,
            protocol: Protocol::Https,
            method: Method::Direct,
        }
    }

    fn pipeline_with(
        strategy_outcome: Result<AcquisitionResult, &'static str>,
        client: Arc<StaticClient>,
    ) -> SitePipeline {
        let chain = AcquisitionChain::new(vec![Arc::new(StaticStrategy {
            outcome: strategy_outcome,
        })]);
        let queue = BatchQueue::new(
            client,
            BatchConfig {
                batch_size: 1,
                ..BatchConfig::default()
            },
            None,
        );
        SitePipeline::new(
            chain,
            Arc::new(NoopRenderer),
            queue,
            Arc::new(Config::default()),
            None,
        )
    }

    fn client_for(site_id: &str, phone: &str) -> Arc<StaticClient> {
        let mut data = ExtractedData::default();
        data.phone_numbers.insert(phone.to_string());
        let mut map = HashMap::new();
        map.insert(site_id.to_string(), data);
        Arc::new(StaticClient {
            map,
            fail_with: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_successful_run_extracts_contacts() {
        let client = client_for("example.com", "+1 555 0100");
        let pipeline = pipeline_with(
            Ok(page_result(
                5_000,
                &["https://example.com/contact", "https://example.com/shop"],
            )),
            client.clone(),
        );

        let report = pipeline.process("example.com").await;

        assert!(report.failure.is_none());
        assert_eq!(report.site_id, "example.com");
        assert!(report.data.phone_numbers.contains("+1 555 0100"));
        assert_eq!(report.record.stage, Stage::Done);
        assert_eq!(
            report.record.contact_links,
            vec!["https://example.com/contact".to_string()]
        );
        assert_eq!(report.record.contact_pages_fetched, 1);

        // The contact page's text is folded in under a delimiter header
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][0].text.contains("=== https://example.com/contact ==="));
    }

    #[tokio::test]
    async fn test_download_failure_skips_extraction() {
        let client = client_for("example.com", "+1 555 0100");
        let pipeline = pipeline_with(Err("operation timed out"), client.clone());

        let report = pipeline.process("example.com").await;

        let failure = report.failure.expect("must be classified");
        assert_eq!(failure.kind, FailureKind::Download);
        assert!(report.data.is_empty());
        assert_eq!(report.record.stage, Stage::Failed);
        // Extraction never ran
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_record() {
        let client = Arc::new(StaticClient {
            map: HashMap::new(),
            fail_with: Some("invalid api key"),
            calls: Mutex::new(Vec::new()),
        });
        let pipeline = pipeline_with(Ok(page_result(5_000, &[])), client);

        let report = pipeline.process("example.com").await;

        let failure = report.failure.expect("must be classified");
        assert_eq!(failure.kind, FailureKind::Extraction);
        assert!(report.data.is_empty());
        // Acquisition succeeded before the failure
        assert!(report.record.acquisition.as_ref().unwrap().success);
    }

    #[tokio::test]
    async fn test_rendering_failure_is_recovered_silently() {
        let client = client_for("example.com", "+1 555 0100");
        // Sub-threshold result with no browser available
        let pipeline = pipeline_with(Ok(page_result(100, &[])), client);

        let report = pipeline.process("example.com").await;

        assert!(report.failure.is_none());
        assert!(!report.record.rendered);
        // The original (small) result still flowed through extraction
        assert!(report.data.phone_numbers.contains("+1 555 0100"));
    }
}
