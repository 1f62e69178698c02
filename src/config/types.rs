use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Attribute map of a `<meta>` or injected element
pub type AttributeMap = BTreeMap<String, String>;

/// Main configuration structure for Loco-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// URL of the starting page
    pub page: String,

    /// Site name, used for the default output directory
    #[serde(default)]
    pub name: Option<String>,

    /// Explicit output directory
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Whether internal links keep the `index.html` file name
    #[serde(rename = "extension-in-links", default = "default_true")]
    pub extension_in_links: bool,

    /// Asset directory, relative to the output directory
    #[serde(rename = "assets-dir", default = "default_assets_dir")]
    pub assets_dir: String,

    /// Extra host patterns whose assets are localized
    #[serde(rename = "asset-hosts", default)]
    pub asset_hosts: Vec<String>,

    #[serde(default)]
    pub render: RenderConfig,

    /// Global layer applied to every page
    #[serde(default)]
    pub site: ConfigLayer,

    /// Layers keyed by host (wildcards allowed)
    #[serde(default)]
    pub domains: BTreeMap<String, ConfigLayer>,

    /// Layers keyed by URL token
    #[serde(default)]
    pub pages: BTreeMap<String, ConfigLayer>,
}

/// Browser rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Maximum time to wait for one page to become ready (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Readiness condition
    #[serde(default)]
    pub readiness: ReadinessKind,

    /// CSS selector used by the `selector` readiness condition
    #[serde(default)]
    pub marker: Option<String>,

    /// Interval between readiness polls (milliseconds)
    #[serde(rename = "poll-ms", default = "default_poll_ms")]
    pub poll_ms: u64,

    /// Fixed wait used by the `delay` readiness condition (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Chromium executable; auto-detected when absent
    #[serde(rename = "browser-path", default)]
    pub browser_path: Option<PathBuf>,

    #[serde(rename = "window-width", default = "default_window_width")]
    pub window_width: u32,

    #[serde(rename = "window-height", default = "default_window_height")]
    pub window_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            readiness: ReadinessKind::default(),
            marker: None,
            poll_ms: default_poll_ms(),
            settle_ms: default_settle_ms(),
            headless: true,
            browser_path: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

/// How the renderer decides a page has finished rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessKind {
    /// Serialized DOM unchanged across two consecutive polls
    #[default]
    Stable,
    /// A marker element is present
    Selector,
    /// Fixed settle delay after navigation
    Delay,
}

/// One configuration layer (`[site]`, `[domains."<host>"]` or `[pages."<token>"]`)
///
/// Every key is optional so that unspecified keys fall through to the layer
/// below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    #[serde(rename = "cache-images", default)]
    pub cache_images: Option<bool>,

    #[serde(rename = "cache-backgrounds", default)]
    pub cache_backgrounds: Option<bool>,

    #[serde(rename = "cache-stylesheets", default)]
    pub cache_stylesheets: Option<bool>,

    #[serde(rename = "cache-scripts", default)]
    pub cache_scripts: Option<bool>,

    #[serde(rename = "cache-fonts", default)]
    pub cache_fonts: Option<bool>,

    /// Turn in-domain links into `<span>` and do not follow them
    #[serde(rename = "no-links", default)]
    pub no_links: Option<bool>,

    /// Remove social and OpenGraph meta tags
    #[serde(rename = "strip-social-meta", default)]
    pub strip_social_meta: Option<bool>,

    /// Meta tags to add, each an attribute map
    #[serde(default)]
    pub meta: Vec<AttributeMap>,

    /// Google font family per target (`site`, `h1`, or a CSS selector)
    #[serde(default)]
    pub fonts: BTreeMap<String, String>,

    /// CSS selectors of elements to delete
    #[serde(rename = "remove-selectors", default)]
    pub remove_selectors: Vec<String>,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub inject: InjectConfig,

    /// Output path override; only meaningful in page layers
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Elements removed before localization
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CleanupConfig {
    #[serde(default)]
    pub scripts: Vec<ScriptRef>,
}

/// A script identified by its `src`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptRef {
    pub src: String,
}

/// Elements appended to `<head>` and `<body>`, keyed by tag name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InjectConfig {
    #[serde(default)]
    pub head: BTreeMap<String, Vec<AttributeMap>>,

    #[serde(default)]
    pub body: BTreeMap<String, Vec<AttributeMap>>,
}

fn default_true() -> bool {
    true
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_poll_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    5000
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    20000
}

impl Config {
    /// Builds the default configuration for a bare page URL
    pub fn from_url(page: &str) -> Self {
        Self {
            page: page.to_string(),
            name: None,
            output: None,
            extension_in_links: true,
            assets_dir: default_assets_dir(),
            asset_hosts: Vec::new(),
            render: RenderConfig::default(),
            site: ConfigLayer::default(),
            domains: BTreeMap::new(),
            pages: BTreeMap::new(),
        }
    }

    /// Output directory: `output`, else `dist/<name>`, else `dist/<host>`
    pub fn output_dir(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }
        let site = match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => url::Url::parse(&self.page)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
                .unwrap_or_else(|| "site".to_string()),
        };
        PathBuf::from("dist").join(site)
    }
}
