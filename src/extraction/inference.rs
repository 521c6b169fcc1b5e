//! Client for the external inference service.
//!
//! The wire contract is deliberately narrow: one POST carrying an
//! instruction string plus the batch items, answered by a collection keyed
//! on site identifier. The instruction text is configuration, not logic;
//! nothing here interprets it. The service is rate-limited and
//! occasionally erroring; retry policy belongs to the batch queue, not to
//! this client.

use super::{BatchItem, ExtractedData};
use crate::config::InferenceConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One outbound extraction call per flush.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn extract_batch(&self, items: &[BatchItem]) -> Result<HashMap<String, ExtractedData>>;
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: &'a str,
    items: &'a [BatchItem],
}

/// Per-site fields as the service reports them. Absent fields default to
/// empty lists.
#[derive(Debug, Default, Deserialize)]
struct SiteFields {
    #[serde(default)]
    phone_numbers: Vec<String>,
    #[serde(default)]
    social_media_links: Vec<String>,
    #[serde(default)]
    addresses: Vec<String>,
}

impl From<SiteFields> for ExtractedData {
    fn from(fields: SiteFields) -> Self {
        Self {
            phone_numbers: fields.phone_numbers.into_iter().collect(),
            social_links: fields.social_media_links.into_iter().collect(),
            addresses: fields.addresses.into_iter().collect(),
        }
    }
}

/// HTTP implementation of [`InferenceClient`].
pub struct HttpInferenceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    system_instruction: String,
    timeout: Duration,
}

impl HttpInferenceClient {
    pub fn new(config: &InferenceConfig, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            api_key,
            system_instruction: config.system_instruction.clone(),
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn extract_batch(&self, items: &[BatchItem]) -> Result<HashMap<String, ExtractedData>> {
        if self.endpoint.is_empty() {
            bail!("no inference endpoint configured");
        }

        let request = InferenceRequest {
            system_instruction: &self.system_instruction,
            items,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.header("x-api-key", key.as_str());
        }

        let response = builder
            .send()
            .await
            .context("inference request failed to send")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "inference request returned status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            );
        }

        let fields: HashMap<String, SiteFields> = response
            .json()
            .await
            .context("inference response was not parseable")?;

        Ok(fields
            .into_iter()
            .map(|(site_id, f)| (site_id, f.into()))
            .collect())
    }
}
