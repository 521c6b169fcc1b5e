//! Bounded worker pool over the input set.
//!
//! Workers pull from a shared FIFO of inputs and each runs one site's
//! pipeline to completion before taking the next. Concurrency is bounded
//! at the configured pool size; completion order across sites is
//! unspecified.

use super::orchestrator::SitePipeline;
use super::SiteReport;
use crate::error::FailureKind;
use crate::events::{self, EventSender, PipelineEvent};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

/// Aggregate counts for a full run, keyed by failure kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub download_failures: usize,
    pub extraction_failures: usize,
    pub unexpected_failures: usize,
}

impl RunSummary {
    fn record(&mut self, report: &SiteReport) {
        match report.failure.as_ref().map(|f| f.kind) {
            None => self.succeeded += 1,
            Some(FailureKind::Download) => self.download_failures += 1,
            Some(FailureKind::Extraction) => self.extraction_failures += 1,
            Some(FailureKind::Unexpected) => self.unexpected_failures += 1,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} succeeded ({} download, {} extraction, {} unexpected failures)",
            self.succeeded,
            self.total,
            self.download_failures,
            self.extraction_failures,
            self.unexpected_failures
        )
    }
}

/// Bounded pool of site workers sharing one pipeline instance.
pub struct WorkerPool {
    pipeline: Arc<SitePipeline>,
    concurrency: usize,
    events: Option<EventSender>,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<SitePipeline>,
        concurrency: usize,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
            events,
        }
    }

    /// Drive every input through the pipeline, streaming reports into the
    /// sink channel as sites complete.
    pub async fn run(
        &self,
        inputs: Vec<String>,
        reports: mpsc::Sender<SiteReport>,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary {
            total: inputs.len(),
            ..RunSummary::default()
        };

        let mut completed = stream::iter(inputs)
            .map(|raw| {
                let pipeline = Arc::clone(&self.pipeline);
                async move { pipeline.process(&raw).await }
            })
            .buffer_unordered(self.concurrency);

        while let Some(report) = completed.next().await {
            summary.record(&report);
            if reports.send(report).await.is_err() {
                warn!("result sink closed; dropping remaining reports");
            }
        }

        events::emit(
            &self.events,
            PipelineEvent::RunCompleted {
                total: summary.total,
                succeeded: summary.succeeded,
                download_failures: summary.download_failures,
                extraction_failures: summary.extraction_failures,
                unexpected_failures: summary.unexpected_failures,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        );
        summary
    }
}
