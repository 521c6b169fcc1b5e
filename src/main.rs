// Copyright 2026 Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use clap::Parser;
use harvest_runtime::acquisition::chain::AcquisitionChain;
use harvest_runtime::acquisition::http_client::HttpClient;
use harvest_runtime::config::Config;
use harvest_runtime::events::{self, PipelineEvent};
use harvest_runtime::extraction::batch::BatchQueue;
use harvest_runtime::extraction::inference::HttpInferenceClient;
use harvest_runtime::pipeline::{SitePipeline, WorkerPool};
use harvest_runtime::renderer::chromium::ChromiumRenderer;
use harvest_runtime::renderer::{NoopRenderer, Renderer};
use harvest_runtime::sink;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "harvest",
    about = "Harvest: resilient contact-data acquisition pipeline",
    version
)]
struct Cli {
    /// Input file with one site identifier (hostname or URL) per line
    input: PathBuf,

    /// Result file (one JSON line per site)
    #[arg(long, short, default_value = "results.jsonl")]
    output: PathBuf,

    /// JSON config file; unspecified values keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the worker pool size
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip launching a browser (script-driven pages stay unrendered)
    #[arg(long)]
    no_browser: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = match cli.config {
        Some(ref path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(concurrency) = cli.concurrency {
        config.pool_size = concurrency;
    }
    let config = Arc::new(config);

    let inputs = read_inputs(&cli.input)?;
    if inputs.is_empty() {
        warn!("no input sites in {}", cli.input.display());
        return Ok(());
    }
    info!("processing {} site(s)", inputs.len());

    let renderer: Arc<dyn Renderer> = if cli.no_browser {
        Arc::new(NoopRenderer)
    } else {
        match ChromiumRenderer::new().await {
            Ok(renderer) => Arc::new(renderer),
            Err(e) => {
                warn!("browser unavailable, script-driven pages stay unrendered: {e:#}");
                Arc::new(NoopRenderer)
            }
        }
    };

    let (event_tx, event_rx) = events::channel();
    let progress = tokio::spawn(print_progress(event_rx));

    let client = HttpClient::new(config.direct_timeout_ms);
    let chain = AcquisitionChain::standard(
        client,
        &config.proxy_base_url,
        config.direct_timeout_ms,
        config.render_timeout_ms,
    );
    let inference = Arc::new(HttpInferenceClient::new(
        &config.inference,
        config.resolved_api_key(),
    ));
    let queue = BatchQueue::new(inference, config.batch.clone(), Some(event_tx.clone()));

    let pipeline = Arc::new(SitePipeline::new(
        chain,
        renderer.clone(),
        queue.clone(),
        config.clone(),
        Some(event_tx.clone()),
    ));
    let pool = WorkerPool::new(pipeline, config.pool_size, Some(event_tx.clone()));

    let (report_tx, writer) = sink::spawn_jsonl_writer(cli.output.clone());
    let summary = pool.run(inputs, report_tx).await;

    // Force out anything the size/time triggers never reached
    queue.drain().await;
    let _ = renderer.shutdown().await;

    // Every sender clone must go before the progress task can finish
    drop(pool);
    drop(queue);
    drop(event_tx);
    let _ = progress.await;

    let written = writer
        .await
        .context("result writer task failed")??;
    info!(
        "run complete: {summary}; {written} record(s) written to {}",
        cli.output.display()
    );

    Ok(())
}

fn read_inputs(path: &PathBuf) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input file: {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn print_progress(mut rx: events::EventReceiver) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            Err(_) => break,
        };
        match event {
            PipelineEvent::SiteCompleted {
                site_id,
                phone_numbers,
                social_links,
                addresses,
                elapsed_ms,
            } => info!(
                "{site_id}: {phone_numbers} phone(s), {social_links} social, \
                 {addresses} address(es) in {elapsed_ms}ms"
            ),
            PipelineEvent::SiteFailed {
                site_id,
                kind,
                error,
            } => warn!("{site_id}: {kind} failure: {error}"),
            PipelineEvent::BatchFlushed {
                item_count,
                attempts,
                elapsed_ms,
            } => info!("flushed {item_count} extraction item(s) in {elapsed_ms}ms ({attempts} attempt(s))"),
            _ => {}
        }
    }
}

