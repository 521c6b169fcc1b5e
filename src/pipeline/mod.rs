//! Per-site pipeline orchestration and the bounded worker pool.

pub mod orchestrator;
pub mod pool;

pub use orchestrator::SitePipeline;
pub use pool::{RunSummary, WorkerPool};

use crate::acquisition::AcquisitionOutcome;
use crate::error::{FailureKind, SiteFailure};
use crate::extraction::ExtractedData;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use url::Url;

/// Pipeline stages of one site run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Acquiring,
    RenderingFallback,
    LocatingContacts,
    AcquiringContacts,
    Extracting,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::RenderingFallback => write!(f, "rendering_fallback"),
            Self::LocatingContacts => write!(f, "locating_contacts"),
            Self::AcquiringContacts => write!(f, "acquiring_contacts"),
            Self::Extracting => write!(f, "extracting"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Duration spent in one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Per-site transient state kept for reporting.
///
/// The orchestrator populates this as a side effect; no core algorithm
/// reads it back.
#[derive(Debug, Clone, Serialize)]
pub struct SiteRecord {
    /// Completed stages with the time spent in each.
    pub timeline: Vec<StageTiming>,
    /// Current (or terminal) stage.
    pub stage: Stage,
    /// How acquisition concluded, when it ran at all.
    pub acquisition: Option<AcquisitionOutcome>,
    /// Whether the rendering fallback replaced the direct result.
    pub rendered: bool,
    /// Contact links discovered on the main page.
    pub contact_links: Vec<String>,
    /// Contact pages successfully folded into the extraction text.
    pub contact_pages_fetched: usize,
    /// Wall-clock total for the whole run.
    pub total_ms: u64,
    #[serde(skip)]
    started: Option<Instant>,
    #[serde(skip)]
    stage_started: Option<Instant>,
}

impl SiteRecord {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            timeline: Vec::new(),
            stage: Stage::Pending,
            acquisition: None,
            rendered: false,
            contact_links: Vec::new(),
            contact_pages_fetched: 0,
            total_ms: 0,
            started: Some(now),
            stage_started: Some(now),
        }
    }

    /// Close out the current stage and enter the next one.
    pub fn advance(&mut self, next: Stage) {
        if let Some(since) = self.stage_started {
            self.timeline.push(StageTiming {
                stage: self.stage,
                elapsed_ms: since.elapsed().as_millis() as u64,
            });
        }
        self.stage = next;
        self.stage_started = Some(Instant::now());
        if matches!(next, Stage::Done | Stage::Failed) {
            self.total_ms = self
                .started
                .map(|s| s.elapsed().as_millis() as u64)
                .unwrap_or(0);
        }
    }
}

impl Default for SiteRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal failure, flattened for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub detail: String,
}

impl From<&SiteFailure> for FailureRecord {
    fn from(failure: &SiteFailure) -> Self {
        Self {
            kind: failure.kind(),
            detail: failure.detail().to_string(),
        }
    }
}

/// Everything the pipeline emits for one site.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub site_id: String,
    pub url: String,
    /// Extracted contacts; empty when the site failed.
    pub data: ExtractedData,
    pub failure: Option<FailureRecord>,
    pub record: SiteRecord,
}

/// Normalize a raw input identifier into a fetchable URL: trim, strip one
/// trailing period, and default to the secure scheme when none is given.
pub fn normalize_input(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Stable identifier for batch keying and reporting: the URL's host.
pub fn site_id_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
