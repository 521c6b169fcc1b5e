// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed pipeline events.
//!
//! Every stage of the pipeline emits [`PipelineEvent`]s through a
//! `tokio::sync::broadcast` channel. Consumers — the CLI progress printer,
//! log files, future dashboards — subscribe independently. When no
//! subscriber exists, events are silently dropped.

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};

/// Every event the pipeline emits. Serialized to JSON for log streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A site's pipeline run has started.
    SiteStarted { site_id: String, url: String },
    /// Acquisition settled on a strategy.
    SiteAcquired {
        site_id: String,
        strategy: String,
        size_bytes: usize,
    },
    /// The rendering fallback ran for a script-driven page.
    SiteRendered { site_id: String, size_bytes: usize },
    /// Contact-page discovery finished.
    ContactLinksFound { site_id: String, count: usize },
    /// A site completed with extracted data.
    SiteCompleted {
        site_id: String,
        phone_numbers: usize,
        social_links: usize,
        addresses: usize,
        elapsed_ms: u64,
    },
    /// A site terminated with a classified failure.
    SiteFailed {
        site_id: String,
        kind: FailureKind,
        error: String,
    },
    /// A batch of extraction requests was dispatched.
    BatchFlushed {
        item_count: usize,
        attempts: u32,
        elapsed_ms: u64,
    },
    /// The whole run finished.
    RunCompleted {
        total: usize,
        succeeded: usize,
        download_failures: usize,
        extraction_failures: usize,
        unexpected_failures: usize,
        elapsed_ms: u64,
    },
}

/// Sender handle for emitting pipeline events.
pub type EventSender = tokio::sync::broadcast::Sender<PipelineEvent>;

/// Receiver handle for consuming pipeline events.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PipelineEvent>;

/// Create a new event broadcast channel with a bounded buffer.
///
/// 256 events absorbs a full worker pool's burst between consumer polls.
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit an event, silently ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<EventSender>, event: PipelineEvent) {
    if let Some(ref sender) = tx {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::SiteFailed {
            site_id: "example.com".to_string(),
            kind: FailureKind::Download,
            error: "all strategies exhausted".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SiteFailed"));
        assert!(json.contains("download"));

        // Roundtrip
        let parsed: PipelineEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            PipelineEvent::SiteFailed { site_id, .. } => assert_eq!(site_id, "example.com"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx); // No receivers
        emit(
            &Some(tx),
            PipelineEvent::SiteStarted {
                site_id: "a".to_string(),
                url: "https://a".to_string(),
            },
        );
    }

    #[test]
    fn test_emit_none_sender() {
        emit(
            &None,
            PipelineEvent::ContactLinksFound {
                site_id: "a".to_string(),
                count: 0,
            },
        );
    }
}
