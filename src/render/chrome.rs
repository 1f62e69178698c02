//! Chromium backend for `PageRenderer`

use super::{PageRenderer, Readiness, RenderedDocument, StabilityTracker};
use crate::config::RenderConfig;
use crate::RenderError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Finds a Chrome/Chromium executable on this system
///
/// `CHROMIUM_PATH` overrides the platform search paths.
pub fn find_browser_executable() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Some(path);
        }
        warn!(
            "CHROMIUM_PATH points to a non-existent file: {}",
            path.display()
        );
    }

    let candidates: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .inspect(|path| info!("Found browser at: {}", path.display()))
}

/// Downloads a managed Chromium build into the temp directory
async fn download_managed_browser() -> Result<PathBuf> {
    info!("No local browser found, downloading managed Chromium...");

    let cache_dir = std::env::temp_dir().join("loco_mirror_chromium");
    std::fs::create_dir_all(&cache_dir).context("Failed to create browser cache directory")?;

    let fetcher = BrowserFetcher::new(
        BrowserFetcherOptions::builder()
            .with_path(&cache_dir)
            .build()
            .context("Failed to build fetcher options")?,
    );
    let revision = fetcher.fetch().await.context("Failed to fetch browser")?;

    info!("Downloaded Chromium to: {}", revision.folder_path.display());
    Ok(revision.executable_path)
}

/// Renders pages in one shared Chromium tab
pub struct ChromeRenderer {
    browser: Mutex<Browser>,
    page: Mutex<Page>,
    handler: JoinHandle<()>,
    readiness: Readiness,
    user_data_dir: PathBuf,
}

impl ChromeRenderer {
    /// Launches Chromium with the configured window and headless mode
    pub async fn launch(config: &RenderConfig) -> Result<Self> {
        let chrome_path = match config.browser_path.clone().or_else(find_browser_executable) {
            Some(path) => path,
            None => download_managed_browser().await?,
        };

        let user_data_dir =
            std::env::temp_dir().join(format!("loco_mirror_chrome_{}", std::process::id()));
        std::fs::create_dir_all(&user_data_dir)
            .context("Failed to create user data directory")?;

        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(config.timeout_secs.max(30)))
            .window_size(config.window_width, config.window_height)
            .user_data_dir(user_data_dir.clone())
            .chrome_executable(chrome_path);

        builder = if config.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        let browser_config = builder
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--incognito")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--hide-scrollbars")
            .arg("--mute-audio")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))?;

        info!("Launching browser");
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let handler_task = task::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // chromiumoxide reports CDP events it cannot decode as errors
                    if message.contains("data did not match any variant")
                        || message.contains("Failed to deserialize WS response")
                    {
                        trace!("Suppressed CDP decode error: {}", message);
                    } else {
                        error!("Browser handler error: {:?}", e);
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;

        Ok(Self {
            browser: Mutex::new(browser),
            page: Mutex::new(page),
            handler: handler_task,
            readiness: Readiness::from_config(config),
            user_data_dir,
        })
    }

    async fn load(&self, page: &Page, url: &Url) -> Result<RenderedDocument, RenderError> {
        page.goto(url.as_str())
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let html = self.wait_until_ready(page).await?;

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        Ok(RenderedDocument {
            url: url.clone(),
            final_url,
            html,
        })
    }

    /// Polls until the readiness condition holds and returns the DOM
    async fn wait_until_ready(&self, page: &Page) -> Result<String, RenderError> {
        match &self.readiness {
            Readiness::Stable { poll } => {
                let mut tracker = StabilityTracker::new();
                loop {
                    let snapshot = content(page).await?;
                    if tracker.observe(snapshot.clone()) {
                        return Ok(snapshot);
                    }
                    debug!("Waiting for page content to settle");
                    tokio::time::sleep(*poll).await;
                }
            }
            Readiness::Selector { marker, poll } => loop {
                if page.find_element(marker.as_str()).await.is_ok() {
                    return content(page).await;
                }
                debug!("Waiting for marker '{}'", marker);
                tokio::time::sleep(*poll).await;
            },
            Readiness::Delay(settle) => {
                tokio::time::sleep(*settle).await;
                content(page).await
            }
        }
    }
}

async fn content(page: &Page) -> Result<String, RenderError> {
    page.content()
        .await
        .map_err(|e| RenderError::Driver(format!("Failed to get page content: {e}")))
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedDocument, RenderError> {
        let page = self.page.lock().await;
        match tokio::time::timeout(timeout, self.load(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                after: timeout,
            }),
        }
    }

    async fn close(&self) -> Result<(), RenderError> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| RenderError::Driver(format!("Failed to close browser: {e}")))?;
        if let Err(e) = browser.wait().await {
            warn!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            warn!(
                "Failed to clean up {}: {}",
                self.user_data_dir.display(),
                e
            );
        }
        Ok(())
    }
}

impl Drop for ChromeRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
