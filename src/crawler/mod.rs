//! Crawler module for mirroring a site
//!
//! This module contains the core crawling logic, including:
//! - The breadth-first work queue
//! - Page rendering, rewriting and export coordination
//! - Link following with de-duplication

mod engine;
mod queue;

pub use engine::{CrawlEngine, RunOptions};
pub use queue::{QueuedPage, WorkQueue};

use crate::cache::HttpFetcher;
use crate::config::Config;
use crate::output::RunSummary;
use crate::render::ChromeRenderer;
use crate::MirrorError;
use std::sync::Arc;

/// Runs a complete mirror with the Chromium renderer and HTTP fetcher
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP client used for assets
/// 2. Launch the browser
/// 3. Render, rewrite and export every reachable page
/// 4. Return the run summary
///
/// # Example
///
/// ```no_run
/// use loco_mirror::config::load_config;
/// use loco_mirror::crawler::{mirror, RunOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("site.toml"))?;
/// let summary = mirror(config, RunOptions::default()).await?;
/// println!("{} pages exported", summary.pages_exported);
/// # Ok(())
/// # }
/// ```
pub async fn mirror(config: Config, options: RunOptions) -> Result<RunSummary, MirrorError> {
    let fetcher = HttpFetcher::new()?;
    let renderer = ChromeRenderer::launch(&config.render)
        .await
        .map_err(|e| MirrorError::Browser(format!("{e:#}")))?;

    let mut engine = CrawlEngine::new(config, options, Box::new(renderer), Arc::new(fetcher))?;
    engine.run().await
}
