//! Integration tests for the mirror
//!
//! These tests drive the crawl engine with a scripted renderer so no browser
//! is needed. Assets come either from an in-memory fetcher or from a
//! wiremock server through the real HTTP fetcher.

use async_trait::async_trait;
use loco_mirror::cache::{AssetFetcher, FetchedAsset, HttpFetcher};
use loco_mirror::config::{Config, ConfigLayer};
use loco_mirror::crawler::{CrawlEngine, RunOptions};
use loco_mirror::render::{PageRenderer, RenderedDocument};
use loco_mirror::state::PageState;
use loco_mirror::{FetchError, RenderError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves fixed HTML per URL; pages listed in `hanging` never become ready
struct StubRenderer {
    pages: HashMap<String, String>,
    hanging: HashSet<String>,
}

impl StubRenderer {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            hanging: HashSet::new(),
        }
    }

    fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }
}

#[async_trait]
impl PageRenderer for StubRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedDocument, RenderError> {
        if self.hanging.contains(url.as_str()) {
            tokio::time::sleep(timeout).await;
            return Err(RenderError::Timeout {
                url: url.to_string(),
                after: timeout,
            });
        }

        match self.pages.get(url.as_str()) {
            Some(html) => Ok(RenderedDocument {
                url: url.clone(),
                final_url: url.clone(),
                html: html.clone(),
            }),
            None => Err(RenderError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }
}

/// In-memory asset server counting how often each URL is requested
struct StubFetcher {
    assets: HashMap<String, (Vec<u8>, &'static str)>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl StubFetcher {
    fn new(assets: &[(&str, &[u8], &'static str)]) -> Self {
        Self {
            assets: assets
                .iter()
                .map(|(url, bytes, content_type)| (url.to_string(), (bytes.to_vec(), *content_type)))
                .collect(),
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn calls(&self) -> Arc<Mutex<HashMap<String, usize>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl AssetFetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedAsset, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        match self.assets.get(url.as_str()) {
            Some((bytes, content_type)) => Ok(FetchedAsset {
                bytes: bytes.clone(),
                content_type: Some(content_type.to_string()),
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

const LOGO: &str = "https://cdn.prod.website-files.com/5f/logo.png";
const BROKEN: &str = "https://cdn.prod.website-files.com/5f/missing.png";

fn site_pages() -> Vec<(&'static str, String)> {
    vec![
        (
            "https://example.com/",
            format!(
                r#"<html><head><title>Home</title></head><body>
<img src="{LOGO}">
<a href="/about">About</a>
<a href="/slow">Slow</a>
<a href="https://twitter.com/example">Twitter</a>
<a href="https://webflow.com" class="w-webflow-badge">Made in Webflow</a>
</body></html>"#
            ),
        ),
        (
            "https://example.com/about",
            format!(
                r#"<html><head><title>About</title></head><body>
<img src="{LOGO}">
<img src="{BROKEN}">
<a href="/">Home</a>
<a href="/about#team">Team</a>
</body></html>"#
            ),
        ),
    ]
}

fn create_test_config(output: &Path) -> Config {
    let mut config = Config::from_url("https://example.com/");
    config.output = Some(output.to_path_buf());
    config
}

fn create_engine(output: &Path, fetcher: Arc<dyn AssetFetcher>) -> CrawlEngine {
    let pages = site_pages();
    let pages: Vec<(&str, &str)> = pages.iter().map(|(u, h)| (*u, h.as_str())).collect();
    let renderer = StubRenderer::new(&pages).hanging("https://example.com/slow");

    CrawlEngine::new(
        create_test_config(output),
        RunOptions {
            timeout: Some(Duration::from_millis(50)),
            ..RunOptions::default()
        },
        Box::new(renderer),
        fetcher,
    )
    .expect("Failed to create engine")
}

fn stub_fetcher() -> StubFetcher {
    StubFetcher::new(&[(LOGO, &b"\x89PNG logo"[..], "image/png")])
}

/// Reads every file under `root` keyed by its relative path
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).expect("Failed to read dir") {
            let path = entry.expect("Failed to read entry").path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(relative, std::fs::read(&path).unwrap());
            }
        }
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files);
    files
}

#[tokio::test]
async fn test_full_mirror_exports_in_domain_pages() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let mut engine = create_engine(&output, Arc::new(stub_fetcher()));

    let summary = engine.run().await.expect("Mirror failed");

    assert_eq!(summary.pages_exported, 2);
    assert_eq!(summary.pages_pending, 0);
    assert!(output.join("index.html").is_file());
    assert!(output.join("about/index.html").is_file());

    let index = std::fs::read_to_string(output.join("index.html")).unwrap();
    assert!(index.contains(r#"href="about/index.html""#));
    assert!(index.contains(r#"href="https://twitter.com/example""#));
    assert!(!index.contains("w-webflow-badge"));
    assert!(!index.contains(LOGO));
    assert!(index.contains(r#"src="assets/"#));

    let about = std::fs::read_to_string(output.join("about/index.html")).unwrap();
    assert!(about.contains(r#"href="../index.html""#));
    assert!(about.contains(r##"href="#team""##));
    assert!(about.contains(r#"src="../assets/"#));

    // External links are never scheduled
    assert!(engine.processed().get("https://twitter.com/example").is_none());
    assert!(summary.skipped_out_of_domain >= 1);
}

#[tokio::test]
async fn test_shared_asset_fetched_once() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let fetcher = stub_fetcher();
    let calls = fetcher.calls();
    let mut engine = create_engine(&output, Arc::new(fetcher));

    let summary = engine.run().await.expect("Mirror failed");

    assert_eq!(calls.lock().unwrap().get(LOGO), Some(&1));
    assert_eq!(summary.assets.fetched, 1);

    let assets: Vec<_> = std::fs::read_dir(output.join("assets"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(assets.len(), 1);
    assert!(assets[0].ends_with(".png"));
}

#[tokio::test]
async fn test_render_timeout_fails_only_that_page() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let mut engine = create_engine(&output, Arc::new(stub_fetcher()));

    let summary = engine.run().await.expect("Mirror failed");

    assert_eq!(summary.pages_failed(), 1);
    assert_eq!(summary.failed[0].url, "https://example.com/slow");
    assert!(!summary.is_success());
    assert!(!output.join("slow/index.html").exists());

    let record = engine.processed().get("https://example.com/slow").unwrap();
    assert_eq!(record.state, PageState::Failed);
    let record = engine.processed().get("https://example.com/about").unwrap();
    assert_eq!(record.state, PageState::Exported);
}

#[tokio::test]
async fn test_broken_image_keeps_remote_reference() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let mut engine = create_engine(&output, Arc::new(stub_fetcher()));

    let summary = engine.run().await.expect("Mirror failed");

    let about = std::fs::read_to_string(output.join("about/index.html")).unwrap();
    assert!(about.contains(BROKEN));
    assert_eq!(summary.assets.failed, 1);
}

#[tokio::test]
async fn test_rerun_produces_identical_tree() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");

    let mut first = create_engine(&output, Arc::new(stub_fetcher()));
    first.run().await.expect("First run failed");
    let before = snapshot(&output);

    let fetcher = stub_fetcher();
    let calls = fetcher.calls();
    let mut second = create_engine(&output, Arc::new(fetcher));
    let summary = second.run().await.expect("Second run failed");
    let after = snapshot(&output);

    assert_eq!(before, after);
    assert!(calls.lock().unwrap().get(LOGO).is_none());
    assert_eq!(summary.assets.reused, 1);
}

#[tokio::test]
async fn test_fresh_destinations_match() {
    let dir = TempDir::new().unwrap();
    let first_output = dir.path().join("first");
    let second_output = dir.path().join("second");

    let mut first = create_engine(&first_output, Arc::new(stub_fetcher()));
    first.run().await.expect("First run failed");
    let mut second = create_engine(&second_output, Arc::new(stub_fetcher()));
    second.run().await.expect("Second run failed");

    let first_tree = snapshot(&first_output);
    assert!(!first_tree.is_empty());
    assert_eq!(first_tree, snapshot(&second_output));
}

#[tokio::test]
async fn test_override_shared_by_two_pages() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let index = r#"<html><body><a href="/about">About</a><a href="/about/team">Team</a></body></html>"#;
    let about = r#"<html><body><h1>About</h1></body></html>"#;
    let team = r#"<html><body><h1>Team</h1></body></html>"#;
    let renderer = StubRenderer::new(&[
        ("https://example.com/", index),
        ("https://example.com/about", about),
        ("https://example.com/about/team", team),
    ]);

    let mut config = create_test_config(&output);
    config.pages.insert(
        "about".to_string(),
        ConfigLayer {
            path: Some(PathBuf::from("about-us.html")),
            ..ConfigLayer::default()
        },
    );

    let mut engine = CrawlEngine::new(
        config,
        RunOptions::default(),
        Box::new(renderer),
        Arc::new(stub_fetcher()),
    )
    .unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.pages_exported, 3);
    assert!(summary.is_success());

    let about_path = &engine.processed().get("https://example.com/about").unwrap().local_path;
    let team_path = &engine.processed().get("https://example.com/about/team").unwrap().local_path;
    assert_eq!(about_path, &PathBuf::from("about-us.html"));
    assert_ne!(team_path, about_path);

    let about_html = std::fs::read_to_string(output.join(about_path)).unwrap();
    let team_html = std::fs::read_to_string(output.join(team_path)).unwrap();
    assert!(about_html.contains("<h1>About</h1>"));
    assert!(team_html.contains("<h1>Team</h1>"));

    let index_html = std::fs::read_to_string(output.join("index.html")).unwrap();
    assert!(index_html.contains(r#"href="about-us.html""#));
    assert!(index_html.contains(&format!(r#"href="{}""#, team_path.display())));
}

#[tokio::test]
async fn test_removed_content_is_not_followed_or_fetched() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let index = format!(
        r#"<html><body>
<div class="w-webflow-badge"><div><a href="/hidden"><img src="{LOGO}"></a></div></div>
<a href="/about">About</a>
</body></html>"#
    );
    let about = "<html><body><p>About</p></body></html>";
    let hidden = "<html><body><p>Hidden</p></body></html>";
    let renderer = StubRenderer::new(&[
        ("https://example.com/", index.as_str()),
        ("https://example.com/about", about),
        ("https://example.com/hidden", hidden),
    ]);
    let fetcher = stub_fetcher();
    let calls = fetcher.calls();

    let mut engine = CrawlEngine::new(
        create_test_config(&output),
        RunOptions::default(),
        Box::new(renderer),
        Arc::new(fetcher),
    )
    .unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.pages_exported, 2);
    assert!(engine.processed().get("https://example.com/hidden").is_none());
    assert!(!output.join("hidden").exists());
    assert!(calls.lock().unwrap().get(LOGO).is_none());
    assert!(!output.join("assets").exists());
}

#[tokio::test]
async fn test_single_page_mode() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let pages = site_pages();
    let pages: Vec<(&str, &str)> = pages.iter().map(|(u, h)| (*u, h.as_str())).collect();

    let mut engine = CrawlEngine::new(
        create_test_config(&output),
        RunOptions {
            single_page: true,
            ..RunOptions::default()
        },
        Box::new(StubRenderer::new(&pages)),
        Arc::new(stub_fetcher()),
    )
    .unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.pages_exported, 1);
    assert!(summary.is_success());
    assert!(!output.join("about").exists());

    // Links still point at where the page would be mirrored
    let index = std::fs::read_to_string(output.join("index.html")).unwrap();
    assert!(index.contains(r#"href="about/index.html""#));
}

#[tokio::test]
async fn test_http_fetcher_reports_status_and_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logo.svg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<svg/>", "image/svg+xml"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::new().expect("Failed to build client");
    let base = Url::parse(&mock_server.uri()).unwrap();

    let asset = fetcher.fetch(&base.join("/logo.svg").unwrap()).await.unwrap();
    assert_eq!(asset.bytes, b"<svg/>");
    assert_eq!(asset.content_type.as_deref(), Some("image/svg+xml"));

    let err = fetcher
        .fetch(&base.join("/gone.png").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_mirror_against_http_server() {
    let mock_server = MockServer::start().await;
    let base = format!("{}/", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"\x89PNG".to_vec(), "image/png"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/css/site.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("@font-face{font-family:Inter;src:url(../fonts/Inter.woff2)}", "text/css"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fonts/Inter.woff2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(b"wOF2".to_vec(), "font/woff2"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let head = r#"<link rel="stylesheet" href="/css/site.css">"#;
    let index = format!(
        r#"<html><head>{head}</head><body><img src="/logo.png"><a href="/pricing">Pricing</a></body></html>"#
    );
    let pricing = format!(
        r#"<html><head>{head}</head><body><img src="/logo.png"><a href="/">Home</a></body></html>"#
    );
    let pricing_url = format!("{}pricing", base);
    let renderer = StubRenderer::new(&[(base.as_str(), index.as_str()), (pricing_url.as_str(), pricing.as_str())]);

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("site");
    let mut config = Config::from_url(&base);
    config.output = Some(output.clone());
    config.asset_hosts = vec!["127.0.0.1".to_string()];

    let mut engine = CrawlEngine::new(
        config,
        RunOptions::default(),
        Box::new(renderer),
        Arc::new(HttpFetcher::new().unwrap()),
    )
    .unwrap();
    let summary = engine.run().await.unwrap();

    assert_eq!(summary.pages_exported, 2);
    assert!(summary.is_success());

    let assets = output.join("assets");
    assert!(assets.join("Inter.woff2").is_file());
    let css_files: Vec<PathBuf> = std::fs::read_dir(&assets)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("css"))
        .collect();
    assert_eq!(css_files.len(), 1);
    let css = std::fs::read_to_string(&css_files[0]).unwrap();
    assert!(css.contains("Inter.woff2"));
    assert!(!css.contains("../fonts/"));

    let pricing_html = std::fs::read_to_string(output.join("pricing/index.html")).unwrap();
    assert!(pricing_html.contains(r#"href="../assets/"#));
    assert!(pricing_html.contains(r#"href="../index.html""#));
}
