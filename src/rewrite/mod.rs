//! DOM rewriting for Loco-Mirror
//!
//! This module turns a rendered page into its offline form:
//! - Strips platform metadata, removal selectors and cleanup scripts
//! - Applies meta overrides, font embedding and injected elements
//! - Localizes images, stylesheets (and their `url()` references), scripts
//! - Rewrites in-domain links to relative paths and reports them for crawling
//!
//! The document is scanned once with `scraper`, every reference is resolved
//! through the asset cache, and the resulting plan is applied in a single
//! streaming pass.

mod html;
mod markup;
mod scan;

pub use html::{apply_plan, AnchorAction, RewritePlan};
pub use markup::{
    font_target_selector, google_fonts_url, meta_key, render_element, render_fonts,
    render_injections, render_meta, INNER_CONTENT_KEYS, NONE_VALUE, SITE_FONT_KEY,
};
pub use scan::{parse_srcset, scan_document, ScanReport};

use crate::cache::{
    collect_css_urls, replace_css_urls, AssetCache, AssetOrigin, AssetSource, CachedAsset,
};
use crate::config::{EffectiveConfig, InjectedTag};
use crate::render::RenderedDocument;
use crate::url::{
    canonical_key, canonicalize_url, is_asset_url, relative_href, resolve_reference,
    PageDirectory, SiteScope,
};
use crate::MirrorError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Counters for one rewritten page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// References now pointing at a local file
    pub assets_localized: usize,
    /// In-scope references left remote because the asset failed
    pub assets_failed: usize,
    /// In-domain links rewritten to a relative path
    pub links_rewritten: usize,
    /// Elements deleted by cleanup rules
    pub elements_removed: usize,
}

/// Result of rewriting one page
#[derive(Debug, Clone)]
pub struct RewriteOutcome {
    pub html: String,
    /// In-domain page links, de-duplicated, in document order
    pub links: Vec<Url>,
    /// Links to other sites, reported but never followed
    pub external_links: Vec<Url>,
    pub stats: RewriteStats,
}

/// Rewrites rendered pages against one mirror
pub struct DomRewriter {
    cache: Arc<AssetCache>,
    pages: Arc<PageDirectory>,
    scope: SiteScope,
    extension_in_links: bool,
}

impl DomRewriter {
    pub fn new(
        cache: Arc<AssetCache>,
        pages: Arc<PageDirectory>,
        scope: SiteScope,
        extension_in_links: bool,
    ) -> Self {
        Self {
            cache,
            pages,
            scope,
            extension_in_links,
        }
    }

    /// Rewrites `doc`, which will be written to `local_path`
    ///
    /// Asset failures are counted and logged but never fail the page; the
    /// reference simply stays remote.
    pub async fn rewrite(
        &self,
        doc: &RenderedDocument,
        effective: &EffectiveConfig,
        local_path: &Path,
    ) -> Result<RewriteOutcome, MirrorError> {
        let report = scan_document(&doc.html, &effective.remove_selectors);
        let base = report
            .base_href
            .as_deref()
            .and_then(|href| doc.final_url.join(href).ok())
            .unwrap_or_else(|| doc.final_url.clone());

        let mut page = PageRewrite {
            rewriter: self,
            base: &base,
            local_path,
            effective,
            plan: RewritePlan {
                remove_selectors: effective.remove_selectors.clone(),
                strip_social_meta: effective.strip_social_meta,
                ..RewritePlan::default()
            },
            stats: RewriteStats::default(),
        };

        page.plan_cleanup(&report);
        page.plan_images(&report).await;
        page.plan_stylesheets(&report).await;
        page.plan_scripts(&report).await;
        page.plan_head().await;
        let (links, external_links) = page.plan_anchors(&report, &doc.url).await;

        let PageRewrite { plan, mut stats, .. } = page;
        let (html, removed) = apply_plan(&doc.html, &plan).map_err(|message| MirrorError::Rewrite {
            url: doc.url.to_string(),
            message,
        })?;
        stats.elements_removed = removed;

        Ok(RewriteOutcome {
            html,
            links,
            external_links,
            stats,
        })
    }
}

/// State for rewriting a single page
struct PageRewrite<'a> {
    rewriter: &'a DomRewriter,
    base: &'a Url,
    local_path: &'a Path,
    effective: &'a EffectiveConfig,
    plan: RewritePlan,
    stats: RewriteStats,
}

impl PageRewrite<'_> {
    fn plan_cleanup(&mut self, report: &ScanReport) {
        let cleanup: HashSet<String> = self
            .effective
            .cleanup_scripts
            .iter()
            .flat_map(|src| {
                let mut keys = vec![src.trim().to_string()];
                if let Some(url) = resolve_reference(self.base, src) {
                    keys.push(canonical_key(&url));
                }
                keys
            })
            .collect();

        for src in &report.scripts {
            let resolved = resolve_reference(self.base, src).map(|u| canonical_key(&u));
            if cleanup.contains(src) || resolved.is_some_and(|k| cleanup.contains(&k)) {
                debug!("Removing script {}", src);
                self.plan.removed_scripts.insert(src.clone());
            }
        }

        self.plan.replaced_meta = self.effective.meta.iter().filter_map(meta_key).collect();
    }

    async fn plan_images(&mut self, report: &ScanReport) {
        if self.effective.cache_images {
            for src in &report.images {
                if let Some(local) = self.localize(src, None).await {
                    self.plan.resources.insert(src.clone(), local);
                }
            }

            for srcset in &report.srcsets {
                let mut changed = false;
                let mut candidates = Vec::new();
                for (url, descriptor) in parse_srcset(srcset) {
                    let url = match self.localize(&url, None).await {
                        Some(local) => {
                            changed = true;
                            local
                        }
                        None => url,
                    };
                    candidates.push(match descriptor {
                        Some(d) => format!("{} {}", url, d),
                        None => url,
                    });
                }
                if changed {
                    self.plan.srcsets.insert(srcset.clone(), candidates.join(", "));
                }
            }
        }

        if self.effective.cache_backgrounds {
            for raw in &report.style_urls {
                if let Some(local) = self.localize(raw, None).await {
                    self.plan.styles.insert(raw.clone(), local);
                }
            }
        }
    }

    async fn plan_stylesheets(&mut self, report: &ScanReport) {
        if !self.effective.cache_stylesheets {
            return;
        }

        for href in &report.stylesheets {
            let Some(url) = self.in_scope(href) else {
                continue;
            };
            let Some(asset) = self.fetch(&url, None, Some("css")).await else {
                continue;
            };

            if asset.origin == AssetOrigin::Fetched
                && self.rewriter.cache.claim_stylesheet(&asset.key).await
            {
                if let Err(e) = self.localize_stylesheet(&url, &asset).await {
                    warn!("Could not localize references in {}: {}", url, e);
                }
            }

            let local = relative_href(self.local_path, &asset.relative_path, true);
            self.plan.resources.insert(href.clone(), local);
        }
    }

    /// Downloads the fonts and images a stylesheet references and points
    /// the stylesheet at the local copies
    async fn localize_stylesheet(&mut self, sheet_url: &Url, sheet: &CachedAsset) -> std::io::Result<()> {
        let path = self.rewriter.cache.absolute_path(sheet);
        let css = tokio::fs::read_to_string(&path).await?;

        let mut replacements = HashMap::new();
        for reference in collect_css_urls(&css) {
            let allowed = if reference.in_font_face {
                self.effective.cache_fonts
            } else {
                self.effective.cache_backgrounds
            };
            if !allowed {
                continue;
            }

            let Some(url) = resolve_reference(sheet_url, &reference.raw)
                .filter(|u| self.rewriter.scope.is_asset_in_scope(u))
            else {
                continue;
            };

            let name = reference
                .in_font_face
                .then(|| url.path_segments().and_then(|mut s| s.next_back()))
                .flatten()
                .map(|n| {
                    urlencoding::decode(n)
                        .map(|d| d.into_owned())
                        .unwrap_or_else(|_| n.to_string())
                })
                .filter(|n| !n.is_empty());

            if let Some(asset) = self.fetch(&url, name.as_deref(), None).await {
                replacements.insert(
                    reference.raw.clone(),
                    relative_href(&sheet.relative_path, &asset.relative_path, true),
                );
            }
        }

        if replacements.is_empty() {
            return Ok(());
        }

        let rewritten = replace_css_urls(&css, &replacements);
        let partial = path.with_extension("css.part");
        tokio::fs::write(&partial, rewritten).await?;
        tokio::fs::rename(&partial, &path).await?;
        debug!("Localized {} references in {}", replacements.len(), sheet_url);
        Ok(())
    }

    async fn plan_scripts(&mut self, report: &ScanReport) {
        if !self.effective.cache_scripts {
            return;
        }
        for src in &report.scripts {
            if self.plan.removed_scripts.contains(src) {
                continue;
            }
            if let Some(local) = self.localize(src, Some("js")).await {
                self.plan.resources.insert(src.clone(), local);
            }
        }
    }

    /// Builds the markup appended to `<head>` and `<body>`
    async fn plan_head(&mut self) {
        let effective = self.effective;
        let mut head = render_meta(&effective.meta);
        head.push_str(&render_fonts(&effective.fonts));

        let inject_head = self.copy_local_files(&effective.inject_head).await;
        head.push_str(&render_injections(&inject_head));
        let inject_body = self.copy_local_files(&effective.inject_body).await;

        self.plan.head_append = head;
        self.plan.body_append = render_injections(&inject_body);
    }

    /// Replaces `href`/`src` values of injected tags with cached copies
    ///
    /// Local files are copied and http(s) URLs downloaded. Anything that fails
    /// is left as configured.
    async fn copy_local_files(&mut self, tags: &[InjectedTag]) -> Vec<InjectedTag> {
        let mut resolved = Vec::with_capacity(tags.len());
        for tag in tags {
            let mut tag = tag.clone();
            for attr in ["href", "src"] {
                let Some(value) = tag.attributes.get(attr).cloned() else {
                    continue;
                };
                let asset = match Url::parse(&value) {
                    Ok(url) if matches!(url.scheme(), "http" | "https") => {
                        self.fetch(&url, None, None).await
                    }
                    Ok(_) => None,
                    Err(_) if Path::new(&value).is_file() => {
                        let source = AssetSource::Local(PathBuf::from(&value));
                        match self.rewriter.cache.get_or_fetch(&source, None, None).await {
                            Ok(asset) => {
                                self.stats.assets_localized += 1;
                                Some(asset)
                            }
                            Err(_) => {
                                self.stats.assets_failed += 1;
                                None
                            }
                        }
                    }
                    Err(_) => None,
                };
                if let Some(asset) = asset {
                    tag.attributes.insert(
                        attr.to_string(),
                        relative_href(self.local_path, &asset.relative_path, true),
                    );
                }
            }
            resolved.push(tag);
        }
        resolved
    }

    /// Decides what every anchor becomes and collects the pages to crawl
    async fn plan_anchors(&mut self, report: &ScanReport, page_url: &Url) -> (Vec<Url>, Vec<Url>) {
        let page_key = canonical_key(page_url);
        let mut links = Vec::new();
        let mut external = Vec::new();
        let mut seen = HashSet::new();

        for href in &report.anchors {
            if href.starts_with('#') {
                continue;
            }
            let Some(target) = resolve_reference(self.base, href) else {
                continue;
            };

            if !self.rewriter.scope.is_in_domain(&target) {
                if !external.contains(&target) {
                    external.push(target);
                }
                continue;
            }

            if is_asset_url(&target) {
                if let Some(asset) = self.fetch(&target, None, None).await {
                    self.plan.anchors.insert(
                        href.clone(),
                        AnchorAction::Href(relative_href(self.local_path, &asset.relative_path, true)),
                    );
                }
                continue;
            }

            if self.effective.no_links {
                self.plan.anchors.insert(href.clone(), AnchorAction::Span);
                continue;
            }

            let target_key = canonical_key(&target);
            let fragment = target.fragment().filter(|f| !f.is_empty());
            let local = if target_key == page_key && fragment.is_some() {
                String::new()
            } else {
                relative_href(
                    self.local_path,
                    &self.rewriter.pages.assign(&target),
                    self.rewriter.extension_in_links,
                )
            };
            let local = match fragment {
                Some(f) => format!("{}#{}", local, f),
                None => local,
            };
            self.plan.anchors.insert(href.clone(), AnchorAction::Href(local));
            self.stats.links_rewritten += 1;

            if target_key != page_key && seen.insert(target_key) {
                links.push(canonicalize_url(target.clone()).unwrap_or(target));
            }
        }

        (links, external)
    }

    /// Resolves a reference and returns it if its host is in asset scope
    fn in_scope(&self, raw: &str) -> Option<Url> {
        resolve_reference(self.base, raw).filter(|u| self.rewriter.scope.is_asset_in_scope(u))
    }

    /// Localizes one in-scope reference, returning the new relative href
    async fn localize(&mut self, raw: &str, extension_hint: Option<&str>) -> Option<String> {
        let url = self.in_scope(raw)?;
        let asset = self.fetch(&url, None, extension_hint).await?;
        Some(relative_href(self.local_path, &asset.relative_path, true))
    }

    async fn fetch(
        &mut self,
        url: &Url,
        name_hint: Option<&str>,
        extension_hint: Option<&str>,
    ) -> Option<CachedAsset> {
        let source = AssetSource::Remote(url.clone());
        match self
            .rewriter
            .cache
            .get_or_fetch(&source, name_hint, extension_hint)
            .await
        {
            Ok(asset) => {
                self.stats.assets_localized += 1;
                Some(asset)
            }
            Err(_) => {
                self.stats.assets_failed += 1;
                None
            }
        }
    }
}
