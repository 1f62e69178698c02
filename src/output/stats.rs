//! Run summary generation
//!
//! This module turns the processed-pages map and cache counters into the
//! end-of-run report.

use crate::cache::CacheStats;
use crate::state::{PageState, ProcessedPages};
use std::path::PathBuf;
use std::time::Duration;

/// A page that did not make it into the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub url: String,
    pub reason: String,
}

/// Outcome of one mirror run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_dir: PathBuf,

    /// Pages written to disk
    pub pages_exported: usize,

    /// Failed pages with their reasons, in scheduling order
    pub failed: Vec<FailedPage>,

    /// Pages still scheduled when the run stopped (single-page runs)
    pub pages_pending: usize,

    /// Distinct out-of-domain links that were not followed
    pub skipped_out_of_domain: usize,

    pub assets: CacheStats,

    pub duration: Duration,
}

impl RunSummary {
    /// Builds the summary from the run's state
    pub fn collect(
        processed: &ProcessedPages,
        assets: CacheStats,
        output_dir: PathBuf,
        duration: Duration,
    ) -> Self {
        let failed = processed
            .records()
            .iter()
            .filter(|r| r.state == PageState::Failed)
            .map(|r| FailedPage {
                url: r.url.clone(),
                reason: r.error.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            output_dir,
            pages_exported: processed.count(PageState::Exported),
            failed,
            pages_pending: processed.count(PageState::Scheduled),
            skipped_out_of_domain: processed.count(PageState::SkippedOutOfDomain),
            assets,
            duration,
        }
    }

    pub fn pages_failed(&self) -> usize {
        self.failed.len()
    }

    /// True when every attempted page was exported
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Prints the summary to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Mirror Summary ===\n");

    println!("Output: {}", summary.output_dir.display());
    println!("Duration: {:.1}s", summary.duration.as_secs_f64());
    println!();

    println!("Pages:");
    println!("  Exported: {}", summary.pages_exported);
    println!("  Failed: {}", summary.pages_failed());
    if summary.pages_pending > 0 {
        println!("  Not visited: {}", summary.pages_pending);
    }
    println!(
        "  Out-of-domain links skipped: {}",
        summary.skipped_out_of_domain
    );
    println!();

    println!("Assets:");
    println!("  Downloaded: {}", summary.assets.fetched);
    println!("  Reused from disk: {}", summary.assets.reused);
    println!("  Copied from local files: {}", summary.assets.copied);
    println!("  Left remote: {}", summary.assets.failed);

    if !summary.failed.is_empty() {
        println!();
        println!("Failed Pages ({}):", summary.failed.len());
        for page in &summary.failed {
            println!("  - {} ({})", page.url, page.reason);
        }
    }
}
