//! Single-writer result sink.
//!
//! Workers complete in arbitrary order, and the sink they feed must not
//! assume concurrent writes are safe. All reports funnel through one mpsc
//! channel into a single writer task that appends one JSON line per site.

use crate::pipeline::SiteReport;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Channel capacity between the pool and the writer task.
const SINK_BUFFER: usize = 256;

/// Spawn the JSONL writer task. Closing the sender flushes and finishes
/// the file; the handle resolves to the number of records written.
pub fn spawn_jsonl_writer(path: PathBuf) -> (mpsc::Sender<SiteReport>, JoinHandle<Result<usize>>) {
    let (tx, mut rx) = mpsc::channel::<SiteReport>(SINK_BUFFER);

    let handle = tokio::spawn(async move {
        let file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("failed to create result file: {}", path.display()))?;
        let mut writer = tokio::io::BufWriter::new(file);

        let mut written = 0usize;
        while let Some(report) = rx.recv().await {
            let line =
                serde_json::to_string(&report).context("failed to serialize site report")?;
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            written += 1;
        }
        writer.flush().await?;
        Ok(written)
    });

    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::SiteRecord;

    fn report(site_id: &str) -> SiteReport {
        SiteReport {
            site_id: site_id.to_string(),
            url: format!("https://{site_id}/"),
            data: Default::default(),
            failure: None,
            record: SiteRecord::new(),
        }
    }

    #[tokio::test]
    async fn test_writes_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let (tx, handle) = spawn_jsonl_writer(path.clone());
        tx.send(report("a.example")).await.unwrap();
        tx.send(report("b.example")).await.unwrap();
        drop(tx);

        let written = handle.await.unwrap().unwrap();
        assert_eq!(written, 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["site_id"], "a.example");
    }
}
