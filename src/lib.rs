//! Loco-Mirror: static mirrors of JavaScript-rendered sites
//!
//! This crate renders every page of a site through a real browser, rewrites the
//! rendered DOM so that images, stylesheets, scripts, fonts and internal links
//! point at local copies, and recursively mirrors every in-domain subpage.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod rewrite;
pub mod state;
pub mod url;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Loco-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("HTML rewrite error for {url}: {message}")]
    Rewrite { url: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition for {url}: {from:?} -> {to:?}")]
    InvalidTransition {
        url: String,
        from: state::PageState,
        to: state::PageState,
    },

    #[error("Page was never scheduled: {0}")]
    UnknownPage(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Errors produced while rendering one page in the browser
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Readiness condition not met for {url} after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Browser driver failed: {0}")]
    Driver(String),
}

/// Errors produced while retrieving one asset
///
/// Cloneable because a failed fetch is cached and handed to every later caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to store asset {path}: {message}")]
    Io { path: String, message: String },

    #[error("Unsupported asset source: {0}")]
    Unsupported(String),
}

/// Errors produced while writing an exported page
#[derive(Debug, Error)]
#[error("Failed to write {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Result type alias for Loco-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, ConfigResolver, EffectiveConfig};
pub use crawler::{CrawlEngine, RunOptions};
pub use state::PageState;
pub use url::{canonicalize, PathMapper};
