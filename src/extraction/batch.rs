//! Coalescing queue in front of the inference service.
//!
//! One process-wide pending list, guarded by a single mutex. A flush is
//! triggered by size (the list reaches `batch_size`) or by time (the
//! configured delay after the first unflushed enqueue), and at most one
//! outbound call is ever in flight; items enqueued mid-flight accumulate
//! for the next flush. Every enqueued site id is resolved or rejected
//! exactly once, including ids the response silently omits.

use super::inference::InferenceClient;
use super::{BatchItem, ExtractedData};
use crate::config::BatchConfig;
use crate::events::{self, EventSender, PipelineEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, warn};

/// Shared rejection for every item of a failed flush.
#[derive(Debug, Clone, Error)]
#[error("batch extraction failed: {message}")]
pub struct BatchError {
    message: Arc<String>,
}

impl BatchError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: Arc::new(message.into()),
        }
    }
}

struct PendingItem {
    item: BatchItem,
    resolver: oneshot::Sender<Result<ExtractedData, BatchError>>,
}

struct QueueState {
    pending: Vec<PendingItem>,
    in_flight: bool,
    timer: Option<tokio::task::JoinHandle<()>>,
}

/// The process-wide extraction batch queue.
///
/// Cheaply cloneable; clones share one pending list. Inject a single
/// instance into every orchestrator instead of hiding it behind a global.
#[derive(Clone)]
pub struct BatchQueue {
    state: Arc<Mutex<QueueState>>,
    client: Arc<dyn InferenceClient>,
    config: BatchConfig,
    idle: Arc<Notify>,
    events: Option<EventSender>,
}

impl BatchQueue {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        config: BatchConfig,
        events: Option<EventSender>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                pending: Vec::new(),
                in_flight: false,
                timer: None,
            })),
            client,
            config,
            idle: Arc::new(Notify::new()),
            events,
        }
    }

    /// Enqueue one site's text and wait for its extraction result.
    pub async fn enqueue(&self, site_id: &str, text: String) -> Result<ExtractedData, BatchError> {
        let (resolver, rx) = oneshot::channel();

        let flush_now = {
            let mut state = self.state.lock().await;
            state.pending.push(PendingItem {
                item: BatchItem {
                    site_id: site_id.to_string(),
                    text,
                },
                resolver,
            });

            if state.pending.len() >= self.config.batch_size {
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                true
            } else {
                if state.timer.is_none() {
                    state.timer = Some(self.spawn_timer());
                }
                false
            }
        };

        if flush_now {
            let queue = self.clone();
            tokio::spawn(async move { queue.run_flush().await });
        }

        rx.await
            .unwrap_or_else(|_| Err(BatchError::new("request dropped before resolution")))
    }

    /// Force-flush everything still pending. Returns once the queue is
    /// empty and no call is in flight; used at shutdown.
    pub async fn drain(&self) {
        loop {
            self.run_flush().await;
            {
                let state = self.state.lock().await;
                if state.pending.is_empty() && !state.in_flight {
                    return;
                }
            }
            self.idle.notified().await;
        }
    }

    fn spawn_timer(&self) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(queue.config.flush_delay_ms)).await;
            {
                let mut state = queue.state.lock().await;
                state.timer = None;
            }
            queue.run_flush().await;
        })
    }

    /// Take and dispatch the pending batch, unless a flush is already in
    /// flight (the in-flight flush will pick the items up on completion).
    async fn run_flush(&self) {
        loop {
            let batch = {
                let mut state = self.state.lock().await;
                if state.in_flight || state.pending.is_empty() {
                    return;
                }
                if let Some(timer) = state.timer.take() {
                    timer.abort();
                }
                state.in_flight = true;
                std::mem::take(&mut state.pending)
            };

            let started = tokio::time::Instant::now();
            let items: Vec<BatchItem> = batch.iter().map(|p| p.item.clone()).collect();
            let outcome = self.dispatch_with_retry(&items).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok((mut by_site, attempts)) => {
                    events::emit(
                        &self.events,
                        PipelineEvent::BatchFlushed {
                            item_count: batch.len(),
                            attempts,
                            elapsed_ms,
                        },
                    );
                    for pending in batch {
                        // Ids the response omits still resolve, with the
                        // empty-but-valid value.
                        let data = by_site.remove(&pending.item.site_id).unwrap_or_default();
                        let _ = pending.resolver.send(Ok(data));
                    }
                }
                Err(error) => {
                    warn!("batch dispatch failed for {} item(s): {error}", batch.len());
                    for pending in batch {
                        let _ = pending.resolver.send(Err(error.clone()));
                    }
                }
            }

            let mut state = self.state.lock().await;
            state.in_flight = false;
            self.idle.notify_one();
            if state.pending.is_empty() {
                return;
            }
            if state.pending.len() >= self.config.batch_size {
                drop(state);
                continue;
            }
            // Items that accumulated mid-flight wait for their own deadline.
            if state.timer.is_none() {
                state.timer = Some(self.spawn_timer());
            }
            return;
        }
    }

    async fn dispatch_with_retry(
        &self,
        items: &[BatchItem],
    ) -> Result<(HashMap<String, ExtractedData>, u32), BatchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.client.extract_batch(items).await {
                Ok(by_site) => return Ok((by_site, attempt)),
                Err(e) => {
                    let detail = format!("{e:#}");
                    if is_transient(&detail) && attempt <= self.config.max_retries {
                        let delay = Duration::from_millis(
                            self.config.backoff_base_ms * 2u64.pow(attempt - 1),
                        );
                        debug!(
                            "transient inference failure (attempt {attempt}), \
                             retrying in {delay:?}: {detail}"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(BatchError::new(detail));
                }
            }
        }
    }
}

/// Whether an error's text carries a transient signature worth retrying:
/// connection resets, timeouts, rate limiting, or exhausted quota.
fn is_transient(detail: &str) -> bool {
    let d = detail.to_ascii_lowercase();
    d.contains("timed out")
        || d.contains("timeout")
        || d.contains("connection reset")
        || d.contains("reset by peer")
        || d.contains("broken pipe")
        || d.contains("rate limit")
        || d.contains("429")
        || d.contains("quota")
        || d.contains("503")
        || d.contains("overloaded")
        || d.contains("unavailable")
}
