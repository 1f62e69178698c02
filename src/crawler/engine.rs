//! Crawl engine - main mirror orchestration logic
//!
//! This module contains the main loop that coordinates a run:
//! - Scheduling pages through the processed-pages map and work queue
//! - Rendering each page in the browser
//! - Rewriting the rendered DOM and localizing its assets
//! - Exporting the result and following discovered links

use crate::cache::{AssetCache, AssetFetcher};
use crate::config::{Config, ConfigResolver};
use crate::crawler::queue::{QueuedPage, WorkQueue};
use crate::output::{CleanOptions, Exporter, RunSummary};
use crate::render::PageRenderer;
use crate::rewrite::DomRewriter;
use crate::state::{Admission, PageState, ProcessedPages};
use crate::url::{canonical_key, canonicalize, PageDirectory, PathMapper, SiteScope};
use crate::MirrorError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Per-run switches that are not part of the site configuration
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Mirror the starting page only
    pub single_page: bool,

    /// Render timeout overriding `[render] timeout-secs`
    pub timeout: Option<Duration>,

    pub clean: CleanOptions,
}

/// Main mirror engine
pub struct CrawlEngine {
    config: Arc<Config>,
    options: RunOptions,
    resolver: ConfigResolver,
    pages: Arc<PageDirectory>,
    scope: SiteScope,
    renderer: Box<dyn PageRenderer>,
    cache: Arc<AssetCache>,
    rewriter: DomRewriter,
    exporter: Exporter,
    processed: ProcessedPages,
    queue: WorkQueue,
}

impl CrawlEngine {
    /// Creates an engine for a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Site configuration
    /// * `options` - Run switches
    /// * `renderer` - Browser backend
    /// * `fetcher` - Asset retrieval backend
    pub fn new(
        config: Config,
        options: RunOptions,
        renderer: Box<dyn PageRenderer>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self, MirrorError> {
        let start = canonicalize(&config.page)?;
        let resolver = ConfigResolver::new(&config);
        let mapper = PathMapper::new(&start).with_overrides(resolver.path_overrides());
        let scope = SiteScope::new(&start, &config.asset_hosts);
        let output_dir = config.output_dir();

        let cache = Arc::new(AssetCache::new(
            output_dir.clone(),
            config.assets_dir.clone(),
            mapper.clone(),
            fetcher,
        ));
        let pages = Arc::new(PageDirectory::new(mapper));
        let rewriter = DomRewriter::new(
            cache.clone(),
            pages.clone(),
            scope.clone(),
            config.extension_in_links,
        );

        Ok(Self {
            config: Arc::new(config),
            options,
            resolver,
            pages,
            scope,
            renderer,
            cache,
            rewriter,
            exporter: Exporter::new(output_dir),
            processed: ProcessedPages::new(),
            queue: WorkQueue::new(),
        })
    }

    /// Runs the mirror to completion
    ///
    /// Page failures are recorded and the run continues; only a failure to
    /// prepare the destination aborts it.
    pub async fn run(&mut self) -> Result<RunSummary, MirrorError> {
        let started = Instant::now();
        let output_dir = self.exporter.output_dir().to_path_buf();

        self.exporter
            .prepare(&self.options.clean, &self.config.assets_dir)?;

        let start = self.pages.mapper().start().clone();
        info!("Mirroring {} into {}", start, output_dir.display());
        self.schedule(start, 0);

        let mut pages_done = 0usize;
        while let Some(queued) = self.queue.next_page() {
            if let Err(e) = self.process_page(&queued).await {
                error!("Error processing {}: {}", queued.url, e);
                if let Err(e) = self.processed.fail(&canonical_key(&queued.url), e.to_string()) {
                    debug!("{}", e);
                }
            }

            pages_done += 1;
            if pages_done % 10 == 0 {
                info!(
                    "Progress: {} pages processed, {} queued",
                    pages_done,
                    self.queue.len()
                );
            }
        }

        if let Err(e) = self.renderer.close().await {
            warn!("Failed to close renderer: {}", e);
        }

        let summary = RunSummary::collect(
            &self.processed,
            self.cache.stats(),
            output_dir,
            started.elapsed(),
        );
        info!(
            "Mirror completed: {} exported, {} failed in {:?}",
            summary.pages_exported,
            summary.pages_failed(),
            summary.duration
        );
        Ok(summary)
    }

    /// Pages scheduled or completed so far
    pub fn processed(&self) -> &ProcessedPages {
        &self.processed
    }

    pub fn output_dir(&self) -> PathBuf {
        self.exporter.output_dir().to_path_buf()
    }

    /// Offers a discovered URL to the run
    ///
    /// Returns true if the URL was new and is now queued.
    fn schedule(&mut self, url: Url, depth: u32) -> bool {
        if !self.scope.is_in_domain(&url) {
            debug!("Not following out-of-domain link {}", url);
            self.processed.note_out_of_domain(url.as_str());
            return false;
        }

        let key = canonical_key(&url);
        let local_path = self.pages.assign(&url);
        match self.processed.schedule(&key, &local_path) {
            Admission::Scheduled => {
                debug!("Scheduled {} -> {}", key, local_path.display());
                let url = Url::parse(&key).unwrap_or(url);
                self.queue.push(QueuedPage { url, depth });
                true
            }
            Admission::AlreadyKnown => false,
            Admission::PathTaken { owner } => {
                let reason = format!(
                    "{} already belongs to {}",
                    local_path.display(),
                    owner
                );
                warn!("Not mirroring {}: {}", key, reason);
                self.processed.reject(&key, &local_path, reason);
                false
            }
        }
    }

    /// Processes a single page
    ///
    /// This method:
    /// 1. Resolves the page configuration
    /// 2. Renders the page
    /// 3. Rewrites the DOM and localizes assets
    /// 4. Exports the result
    /// 5. Schedules newly discovered links
    async fn process_page(&mut self, queued: &QueuedPage) -> Result<(), MirrorError> {
        let key = canonical_key(&queued.url);
        let local_path = self
            .processed
            .get(&key)
            .map(|r| r.local_path.clone())
            .ok_or_else(|| MirrorError::UnknownPage(key.clone()))?;
        let effective = self.resolver.resolve(&queued.url);
        if let Some(token) = &effective.page_token {
            debug!("Page settings '{}' apply to {}", token, key);
        }

        self.processed.transition(&key, PageState::Rendering)?;
        info!("Rendering {}", queued.url);
        let doc = match self.renderer.render(&queued.url, self.render_timeout()).await {
            Ok(doc) => doc,
            Err(e) => {
                error!("Failed to render {}: {}", queued.url, e);
                return self.processed.fail(&key, e.to_string());
            }
        };
        if doc.final_url.as_str() != queued.url.as_str() {
            debug!("{} redirected to {}", queued.url, doc.final_url);
        }

        self.processed.transition(&key, PageState::Rewriting)?;
        let outcome = match self.rewriter.rewrite(&doc, &effective, &local_path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to rewrite {}: {}", queued.url, e);
                return self.processed.fail(&key, e.to_string());
            }
        };
        debug!(
            "{}: {} assets localized, {} left remote, {} links rewritten, {} elements removed",
            key,
            outcome.stats.assets_localized,
            outcome.stats.assets_failed,
            outcome.stats.links_rewritten,
            outcome.stats.elements_removed
        );

        match self.exporter.export(&outcome.html, &local_path) {
            Ok(path) => {
                self.processed.transition(&key, PageState::Exported)?;
                info!("Exported {} -> {}", queued.url, path.display());
            }
            Err(e) => {
                error!("Failed to export {}: {}", queued.url, e);
                return self.processed.fail(&key, e.to_string());
            }
        }

        for link in outcome.external_links {
            self.processed.note_out_of_domain(link.as_str());
        }

        if self.options.single_page {
            return Ok(());
        }

        let mut scheduled = 0;
        for link in outcome.links {
            if self.schedule(link, queued.depth + 1) {
                scheduled += 1;
            }
        }
        if scheduled > 0 {
            debug!("Discovered {} new pages on {}", scheduled, key);
        }

        Ok(())
    }

    fn render_timeout(&self) -> Duration {
        self.options
            .timeout
            .unwrap_or_else(|| Duration::from_secs(self.config.render.timeout_secs))
    }
}
