//! Rendering fallback for script-driven pages.
//!
//! A direct fetch that comes back suspiciously small usually means the
//! markup is an empty shell filled in by client-side script. The fallback
//! re-fetches through a browser context with decorative sub-resources
//! blocked, waits for the DOM to stop growing, and reduces the rendered
//! markup to main content. Failure here is non-fatal; the caller keeps
//! the original result.

use super::{RenderContext, Renderer};
use crate::acquisition::{AcquisitionResult, Method, Protocol};
use crate::config::Config;
use crate::content;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Sub-resource patterns blocked during rendering. Only the DOM matters
/// here; images, fonts, and styles just cost time.
pub const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico", "*.css",
    "*.woff", "*.woff2", "*.ttf", "*.otf", "*.mp4", "*.webm", "*.mp3",
];

/// Tunables for one rendered acquisition.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub timeout_ms: u64,
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_budget_ms: u64,
    pub stability_window: usize,
    pub stability_tolerance: u64,
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            timeout_ms: config.render_timeout_ms,
            settle_ms: config.render_settle_ms,
            poll_interval_ms: config.render_poll_interval_ms,
            poll_budget_ms: config.render_poll_budget_ms,
            stability_window: config.stability_window,
            stability_tolerance: config.stability_tolerance,
        }
    }
}

/// Whether an acquired result needs the rendering fallback.
///
/// The boundary is exclusive: a result of exactly the threshold size is
/// taken at face value.
pub fn needs_rendering(result: &AcquisitionResult, threshold_bytes: usize) -> bool {
    result.size_bytes < threshold_bytes
}

/// Whether the last `window` samples of serialized document length differ
/// pairwise by fewer than `tolerance` characters.
///
/// Pure over the sample sequence so the wait loop's policy tests without a
/// browser.
pub fn is_stable(samples: &[u64], window: usize, tolerance: u64) -> bool {
    if samples.len() < window {
        return false;
    }
    samples[samples.len() - window..]
        .windows(2)
        .all(|pair| pair[0].abs_diff(pair[1]) < tolerance)
}

/// Acquire `url` through a fresh browser context.
pub async fn acquire_rendered(
    renderer: &dyn Renderer,
    url: &str,
    options: &RenderOptions,
) -> Result<AcquisitionResult> {
    let mut ctx = renderer.new_context().await?;
    let outcome = render_in_context(ctx.as_mut(), url, options).await;
    if let Err(e) = ctx.close().await {
        debug!("failed to close render context: {e:#}");
    }
    outcome
}

async fn render_in_context(
    ctx: &mut dyn RenderContext,
    url: &str,
    options: &RenderOptions,
) -> Result<AcquisitionResult> {
    // Blocking is a speed optimization; rendering proceeds without it.
    let patterns: Vec<String> = BLOCKED_RESOURCE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect();
    if let Err(e) = ctx.block_resources(&patterns).await {
        debug!("resource blocking unavailable: {e:#}");
    }

    let nav = ctx.navigate(url, options.timeout_ms).await?;

    tokio::time::sleep(Duration::from_millis(options.settle_ms)).await;

    let mut samples: Vec<u64> = Vec::new();
    let deadline = Instant::now() + Duration::from_millis(options.poll_budget_ms);
    loop {
        match ctx.document_length().await {
            Ok(length) => samples.push(length),
            Err(e) => debug!("document length sample failed: {e:#}"),
        }
        if is_stable(&samples, options.stability_window, options.stability_tolerance) {
            break;
        }
        if Instant::now() >= deadline {
            debug!("DOM did not stabilize within budget for {url}");
            break;
        }
        tokio::time::sleep(Duration::from_millis(options.poll_interval_ms)).await;
    }

    let raw_hrefs = ctx.anchor_hrefs().await.unwrap_or_default();
    let markup = ctx.html().await?;

    let base = Url::parse(&nav.final_url).ok();
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for href in &raw_hrefs {
        if let Some(resolved) = content::extractor::resolve_href(base.as_ref(), href) {
            if seen.insert(resolved.clone()) {
                links.push(resolved);
            }
        }
    }

    let protocol = if nav.final_url.starts_with("http:") {
        Protocol::Http
    } else {
        Protocol::Https
    };
    let size_bytes = markup.len();

    let final_url = nav.final_url.clone();
    let text = tokio::task::spawn_blocking(move || {
        let scoped = content::select_main_content(&markup).unwrap_or(markup);
        content::extract(&scoped, &final_url).text
    })
    .await
    .context("rendered-content normalization task failed")?;

    Ok(AcquisitionResult {
        content: text,
        effective_url: nav.final_url,
        size_bytes,
        links,
        is_normalized_text: true,
        protocol,
        method: Method::Direct,
    })
}
