//! Per-page configuration resolution
//!
//! Layers are merged in a fixed order:
//! - built-in defaults
//! - `[site]`
//! - the `[domains]` entry matching the page host
//! - the `[pages]` entry whose token occurs in the page URL
//!
//! Scalars set in a later layer override earlier ones, lists are
//! concatenated in layer order, and the font map is merged key by key.

use crate::config::types::{AttributeMap, Config, ConfigLayer};
use crate::url::{best_token_match, canonical_key, extract_domain, matches_wildcard};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;
use url::Url;

/// Selector applied to every page to remove the platform badge
pub const DEFAULT_REMOVE_SELECTORS: &[&str] = &[".w-webflow-badge"];

/// An element to append to `<head>` or `<body>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedTag {
    pub tag: String,
    pub attributes: AttributeMap,
}

/// Fully merged configuration for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub cache_images: bool,
    pub cache_backgrounds: bool,
    pub cache_stylesheets: bool,
    pub cache_scripts: bool,
    pub cache_fonts: bool,
    pub no_links: bool,
    pub strip_social_meta: bool,
    pub meta: Vec<AttributeMap>,
    pub fonts: BTreeMap<String, String>,
    pub remove_selectors: Vec<String>,
    pub cleanup_scripts: Vec<String>,
    pub inject_head: Vec<InjectedTag>,
    pub inject_body: Vec<InjectedTag>,
    pub path: Option<PathBuf>,
    /// The `[pages]` token that matched, if any
    pub page_token: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            cache_images: true,
            cache_backgrounds: true,
            cache_stylesheets: true,
            cache_scripts: true,
            cache_fonts: true,
            no_links: false,
            strip_social_meta: false,
            meta: Vec::new(),
            fonts: BTreeMap::new(),
            remove_selectors: DEFAULT_REMOVE_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cleanup_scripts: Vec::new(),
            inject_head: Vec::new(),
            inject_body: Vec::new(),
            path: None,
            page_token: None,
        }
    }
}

impl EffectiveConfig {
    fn apply(&mut self, layer: &ConfigLayer) {
        fn set(target: &mut bool, value: Option<bool>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        set(&mut self.cache_images, layer.cache_images);
        set(&mut self.cache_backgrounds, layer.cache_backgrounds);
        set(&mut self.cache_stylesheets, layer.cache_stylesheets);
        set(&mut self.cache_scripts, layer.cache_scripts);
        set(&mut self.cache_fonts, layer.cache_fonts);
        set(&mut self.no_links, layer.no_links);
        set(&mut self.strip_social_meta, layer.strip_social_meta);

        self.meta.extend(layer.meta.iter().cloned());
        for (target, family) in &layer.fonts {
            self.fonts.insert(target.clone(), family.clone());
        }
        self.remove_selectors
            .extend(layer.remove_selectors.iter().cloned());
        self.cleanup_scripts
            .extend(layer.cleanup.scripts.iter().map(|s| s.src.clone()));

        self.inject_head.extend(flatten_injections(&layer.inject.head));
        self.inject_body.extend(flatten_injections(&layer.inject.body));

        if layer.path.is_some() {
            self.path = layer.path.clone();
        }
    }
}

fn flatten_injections(
    section: &BTreeMap<String, Vec<AttributeMap>>,
) -> impl Iterator<Item = InjectedTag> + '_ {
    section.iter().flat_map(|(tag, elements)| {
        elements.iter().map(move |attributes| InjectedTag {
            tag: tag.clone(),
            attributes: attributes.clone(),
        })
    })
}

/// Merges the configuration layers that apply to a page
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    site: ConfigLayer,
    domains: BTreeMap<String, ConfigLayer>,
    pages: BTreeMap<String, ConfigLayer>,
}

impl ConfigResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            site: config.site.clone(),
            domains: config.domains.clone(),
            pages: config.pages.clone(),
        }
    }

    /// Resolves the effective configuration for a page URL
    ///
    /// # Examples
    ///
    /// ```
    /// use loco_mirror::config::{Config, ConfigLayer, ConfigResolver};
    /// use url::Url;
    ///
    /// let mut config = Config::from_url("https://example.com/");
    /// config.pages.insert(
    ///     "about".to_string(),
    ///     ConfigLayer { no_links: Some(true), ..ConfigLayer::default() },
    /// );
    ///
    /// let resolver = ConfigResolver::new(&config);
    /// let about = resolver.resolve(&Url::parse("https://example.com/about").unwrap());
    /// assert!(about.no_links);
    /// let home = resolver.resolve(&Url::parse("https://example.com/").unwrap());
    /// assert!(!home.no_links);
    /// ```
    pub fn resolve(&self, page_url: &Url) -> EffectiveConfig {
        let mut effective = EffectiveConfig::default();
        effective.apply(&self.site);

        if let Some(layer) = self.domain_layer(page_url) {
            effective.apply(layer);
        }

        let canonical = Url::parse(&canonical_key(page_url)).unwrap_or_else(|_| page_url.clone());
        if let Some(hit) = best_token_match(&self.pages, &canonical) {
            if !hit.shadowed.is_empty() {
                warn!(
                    "Multiple page tokens match {}: using '{}' over {:?}",
                    canonical, hit.token, hit.shadowed
                );
            }
            effective.apply(hit.value);
            effective.page_token = Some(hit.token.to_string());
        }

        effective
    }

    /// Output path overrides declared in page layers, keyed by token
    pub fn path_overrides(&self) -> BTreeMap<String, PathBuf> {
        self.pages
            .iter()
            .filter_map(|(token, layer)| layer.path.clone().map(|p| (token.clone(), p)))
            .collect()
    }

    /// The most specific `[domains]` entry matching the page host
    fn domain_layer(&self, page_url: &Url) -> Option<&ConfigLayer> {
        let host = extract_domain(page_url)?;
        self.domains
            .iter()
            .filter(|(pattern, _)| matches_wildcard(pattern, &host))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, layer)| layer)
    }
}
