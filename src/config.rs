//! Runtime configuration.
//!
//! Every tunable lives here with a serde default, so a partial JSON file
//! overrides only the values it names. Defaults match the shipped behavior;
//! none of them are load-bearing constants elsewhere in the code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_DIRECT_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_SPA_THRESHOLD_BYTES: usize = 1_500;
const DEFAULT_RENDER_SETTLE_MS: u64 = 1_000;
const DEFAULT_RENDER_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_RENDER_POLL_BUDGET_MS: u64 = 5_000;
const DEFAULT_STABILITY_WINDOW: usize = 3;
const DEFAULT_STABILITY_TOLERANCE: u64 = 50;
const DEFAULT_BATCH_SIZE: usize = 20;
const DEFAULT_FLUSH_DELAY_MS: u64 = 1_000;
const DEFAULT_BATCH_RETRIES: u32 = 2;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_POOL_SIZE: usize = 30;
const DEFAULT_PROXY_BASE_URL: &str = "https://r.jina.ai";
const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 60_000;

const DEFAULT_SYSTEM_INSTRUCTION: &str = "For each item, read the page text and return a JSON \
object keyed by siteId. Each value holds phone_numbers, social_media_links and addresses \
arrays with every contact detail found in that item's text. Use empty arrays when nothing \
is found.";

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-request timeout for direct (non-rendered) acquisition.
    pub direct_timeout_ms: u64,
    /// Navigation timeout for the rendering fallback.
    pub render_timeout_ms: u64,
    /// Results smaller than this many bytes trigger the rendering fallback.
    pub spa_threshold_bytes: usize,
    /// Fixed delay before DOM-length sampling begins.
    pub render_settle_ms: u64,
    /// Interval between DOM-length samples.
    pub render_poll_interval_ms: u64,
    /// Total sampling budget after the settle delay.
    pub render_poll_budget_ms: u64,
    /// Consecutive samples required to declare the DOM stable.
    pub stability_window: usize,
    /// Maximum character delta between consecutive stable samples.
    pub stability_tolerance: u64,
    /// Base URL of the remote text-rendering proxy.
    pub proxy_base_url: String,
    /// Concurrent site workers.
    pub pool_size: usize,
    pub batch: BatchConfig,
    pub inference: InferenceConfig,
}

/// Extraction batch queue tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pending-item count that triggers an immediate flush.
    pub batch_size: usize,
    /// Flush deadline after the first unflushed enqueue.
    pub flush_delay_ms: u64,
    /// Additional attempts after a transient dispatch failure.
    pub max_retries: u32,
    /// First backoff delay; doubles per retry.
    pub backoff_base_ms: u64,
}

/// External inference service connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Endpoint receiving batched extraction requests.
    pub endpoint: String,
    /// API key; falls back to the HARVEST_API_KEY environment variable.
    pub api_key: Option<String>,
    /// Instruction text sent verbatim with every batch.
    pub system_instruction: String,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            direct_timeout_ms: DEFAULT_DIRECT_TIMEOUT_MS,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
            spa_threshold_bytes: DEFAULT_SPA_THRESHOLD_BYTES,
            render_settle_ms: DEFAULT_RENDER_SETTLE_MS,
            render_poll_interval_ms: DEFAULT_RENDER_POLL_INTERVAL_MS,
            render_poll_budget_ms: DEFAULT_RENDER_POLL_BUDGET_MS,
            stability_window: DEFAULT_STABILITY_WINDOW,
            stability_tolerance: DEFAULT_STABILITY_TOLERANCE,
            proxy_base_url: DEFAULT_PROXY_BASE_URL.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            batch: BatchConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_delay_ms: DEFAULT_FLUSH_DELAY_MS,
            max_retries: DEFAULT_BATCH_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            request_timeout_ms: DEFAULT_INFERENCE_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, filling unspecified fields with
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the inference API key from config or environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.inference
            .api_key
            .clone()
            .or_else(|| std::env::var("HARVEST_API_KEY").ok())
    }
}
