//! Page rendering through a browser engine
//!
//! This module provides:
//! - The `PageRenderer` trait: URL in, rendered DOM snapshot or failure out
//! - Readiness conditions deciding when a client-side rendered page is done
//! - `ChromeRenderer`, the Chromium backend built on `chromiumoxide`

mod chrome;

pub use chrome::{find_browser_executable, ChromeRenderer};

use crate::config::{ReadinessKind, RenderConfig};
use crate::RenderError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// DOM snapshot of one rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// URL that was requested
    pub url: Url,
    /// URL the browser ended on after redirects
    pub final_url: Url,
    /// Serialized DOM after the readiness condition held
    pub html: String,
}

/// Loads a URL, waits for readiness, and returns the rendered DOM
///
/// Implementations may keep one browser session across calls; callers do
/// not render two pages at once.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedDocument, RenderError>;

    /// Releases the browser session
    async fn close(&self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// When a page counts as fully rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Serialized DOM identical across two consecutive polls
    Stable { poll: Duration },
    /// An element matching the marker selector exists
    Selector { marker: String, poll: Duration },
    /// Fixed wait after navigation
    Delay(Duration),
}

impl Readiness {
    pub fn from_config(config: &RenderConfig) -> Self {
        let poll = Duration::from_millis(config.poll_ms);
        match config.readiness {
            ReadinessKind::Stable => Self::Stable { poll },
            ReadinessKind::Selector => Self::Selector {
                marker: config.marker.clone().unwrap_or_default(),
                poll,
            },
            ReadinessKind::Delay => Self::Delay(Duration::from_millis(config.settle_ms)),
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::Stable {
            poll: Duration::from_millis(500),
        }
    }
}

/// Tracks consecutive DOM snapshots for the `Stable` condition
#[derive(Debug, Default)]
pub struct StabilityTracker {
    previous: Option<String>,
}

impl StabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot; true when it equals the previous one
    pub fn observe(&mut self, snapshot: String) -> bool {
        let stable = self.previous.as_deref() == Some(snapshot.as_str());
        self.previous = Some(snapshot);
        stable
    }
}
