//! Asset cache for Loco-Mirror
//!
//! This module owns the "download once" guarantee:
//! - Every asset source (remote URL or local file) maps to one cache entry
//! - The entry is claimed under a lock before any network round trip starts,
//!   so concurrent callers await the same result
//! - Failures are cached too; a broken asset is tried once per run
//! - Files already in the asset directory with the same stem are reused

mod fetcher;
mod stylesheet;

pub use fetcher::{build_http_client, extension_for_content_type, AssetFetcher, FetchedAsset, HttpFetcher};
pub use stylesheet::{collect_css_urls, replace_css_urls, style_attribute_urls, CssReference};

use crate::url::{canonical_key, hash_stem, CacheName, PathMapper};
use crate::FetchError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};
use url::Url;

/// Extension used when neither the URL nor the response says what a file is
pub const FALLBACK_EXTENSION: &str = "bin";

/// Where an asset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    Remote(Url),
    Local(PathBuf),
}

impl AssetSource {
    /// Identity of the source; remote URLs are keyed by canonical form
    pub fn key(&self) -> String {
        match self {
            Self::Remote(url) => canonical_key(url),
            Self::Local(path) => format!("file:{}", path.display()),
        }
    }
}

/// How a cache entry was materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOrigin {
    /// Downloaded during this run
    Fetched,
    /// Found in the asset directory from an earlier run
    OnDisk,
    /// Copied from a local file
    Local,
}

/// A localized asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    pub key: String,
    pub filename: String,
    pub extension: String,
    pub origin: AssetOrigin,
    /// Path relative to the output directory
    pub relative_path: PathBuf,
}

/// Per-run asset counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub fetched: usize,
    pub reused: usize,
    pub copied: usize,
    pub failed: usize,
}

type Slot = Arc<OnceCell<Result<CachedAsset, FetchError>>>;

/// Keyed store of assets downloaded during a run
pub struct AssetCache {
    output_dir: PathBuf,
    assets_dir: PathBuf,
    mapper: PathMapper,
    fetcher: Arc<dyn AssetFetcher>,
    entries: Mutex<HashMap<String, Slot>>,
    claimed_stems: Mutex<HashMap<String, String>>,
    processed_stylesheets: Mutex<HashSet<String>>,
    fetched: AtomicUsize,
    reused: AtomicUsize,
    copied: AtomicUsize,
    failed: AtomicUsize,
}

impl AssetCache {
    /// Creates a cache writing into `output_dir/assets_dir`
    pub fn new(
        output_dir: impl Into<PathBuf>,
        assets_dir: impl Into<PathBuf>,
        mapper: PathMapper,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            assets_dir: assets_dir.into(),
            mapper,
            fetcher,
            entries: Mutex::new(HashMap::new()),
            claimed_stems: Mutex::new(HashMap::new()),
            processed_stylesheets: Mutex::new(HashSet::new()),
            fetched: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
            copied: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Absolute-or-cwd-relative directory that holds asset files
    pub fn asset_dir(&self) -> PathBuf {
        self.output_dir.join(&self.assets_dir)
    }

    /// Returns the cached asset for `source`, materializing it on first use
    ///
    /// Later calls for the same source, including concurrent ones, get the
    /// first call's result without touching the network again.
    ///
    /// # Arguments
    ///
    /// * `source` - Remote URL or local file
    /// * `name_hint` - Explicit filename (sanitized; hash used on collision)
    /// * `extension_hint` - Explicit extension, e.g. `css` for stylesheets
    pub async fn get_or_fetch(
        &self,
        source: &AssetSource,
        name_hint: Option<&str>,
        extension_hint: Option<&str>,
    ) -> Result<CachedAsset, FetchError> {
        let key = source.key();

        let slot = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_init(|| async {
            let result = self.materialize(source, &key, name_hint, extension_hint).await;
            match &result {
                Ok(asset) => match asset.origin {
                    AssetOrigin::Fetched => self.fetched.fetch_add(1, Ordering::Relaxed),
                    AssetOrigin::OnDisk => self.reused.fetch_add(1, Ordering::Relaxed),
                    AssetOrigin::Local => self.copied.fetch_add(1, Ordering::Relaxed),
                },
                Err(e) => {
                    warn!("Asset {} left remote: {}", key, e);
                    self.failed.fetch_add(1, Ordering::Relaxed)
                }
            };
            result
        })
        .await
        .clone()
    }

    /// Returns true the first time it is called for a stylesheet key
    ///
    /// Used so a stylesheet's inner `url()` references are rewritten once.
    pub async fn claim_stylesheet(&self, key: &str) -> bool {
        self.processed_stylesheets
            .lock()
            .await
            .insert(key.to_string())
    }

    /// Absolute location of a cached asset
    pub fn absolute_path(&self, asset: &CachedAsset) -> PathBuf {
        self.output_dir.join(&asset.relative_path)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            fetched: self.fetched.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            copied: self.copied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    async fn materialize(
        &self,
        source: &AssetSource,
        key: &str,
        name_hint: Option<&str>,
        extension_hint: Option<&str>,
    ) -> Result<CachedAsset, FetchError> {
        match source {
            AssetSource::Remote(url) => {
                let name = self.mapper.to_cache_name(url, name_hint, extension_hint);
                let name = self.claim_name(name, url, key).await;
                self.materialize_remote(url, key, name).await
            }
            AssetSource::Local(path) => self.materialize_local(path, key).await,
        }
    }

    /// Reserves the stem for `key`, falling back to the URL hash when an
    /// explicit name is already used by another source
    async fn claim_name(&self, name: CacheName, url: &Url, key: &str) -> CacheName {
        let mut stems = self.claimed_stems.lock().await;
        match stems.get(&name.stem) {
            Some(owner) if owner != key => {
                let fallback = CacheName {
                    stem: hash_stem(url),
                    extension: name.extension.clone(),
                };
                debug!(
                    "Cache name '{}' already used by {}, using '{}' for {}",
                    name.stem, owner, fallback.stem, key
                );
                stems.insert(fallback.stem.clone(), key.to_string());
                fallback
            }
            _ => {
                stems.insert(name.stem.clone(), key.to_string());
                name
            }
        }
    }

    async fn materialize_remote(
        &self,
        url: &Url,
        key: &str,
        name: CacheName,
    ) -> Result<CachedAsset, FetchError> {
        if let Some(existing) = self.find_on_disk(&name.stem).await {
            debug!("'{}' was already downloaded as {}", url, existing);
            return Ok(self.entry(key, existing, AssetOrigin::OnDisk));
        }

        debug!("Downloading '{}'", url);
        let fetched = self.fetcher.fetch(url).await?;

        let extension = name
            .extension
            .clone()
            .or_else(|| {
                fetched
                    .content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let filename = format!("{}.{}", name.stem, extension);

        self.write_asset(&filename, &fetched.bytes).await?;
        Ok(self.entry(key, filename, AssetOrigin::Fetched))
    }

    async fn materialize_local(&self, path: &Path, key: &str) -> Result<CachedAsset, FetchError> {
        if !path.is_file() {
            return Err(FetchError::Io {
                path: path.display().to_string(),
                message: "not a file".to_string(),
            });
        }

        let absolute = std::fs::canonicalize(path).map_err(|e| io_error(path, e))?;
        let stem = Url::from_file_path(&absolute)
            .map(|u| hash_stem(&u))
            .map_err(|_| FetchError::Unsupported(format!("cannot address {}", path.display())))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let filename = format!("{}.{}", stem, extension);

        let dir = self.asset_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;
        let destination = dir.join(&filename);
        debug!("Caching local file '{}'", path.display());
        tokio::fs::copy(path, &destination)
            .await
            .map_err(|e| io_error(&destination, e))?;

        Ok(self.entry(key, filename, AssetOrigin::Local))
    }

    fn entry(&self, key: &str, filename: String, origin: AssetOrigin) -> CachedAsset {
        let extension = Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string();
        CachedAsset {
            key: key.to_string(),
            relative_path: self.assets_dir.join(&filename),
            filename,
            extension,
            origin,
        }
    }

    /// Finds a file in the asset directory whose stem equals `stem`
    async fn find_on_disk(&self, stem: &str) -> Option<String> {
        let mut entries = tokio::fs::read_dir(self.asset_dir()).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let matches = path.file_stem().and_then(|s| s.to_str()) == Some(stem)
                && path.extension().and_then(|e| e.to_str()) != Some("part");
            if matches && path.is_file() {
                return path.file_name().and_then(|n| n.to_str()).map(str::to_string);
            }
        }
        None
    }

    /// Writes through a `.part` file so an interrupted run never leaves a
    /// truncated asset that a later run would reuse
    async fn write_asset(&self, filename: &str, bytes: &[u8]) -> Result<(), FetchError> {
        let dir = self.asset_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let destination = dir.join(filename);
        let partial = dir.join(format!("{}.part", filename));
        tokio::fs::write(&partial, bytes)
            .await
            .map_err(|e| io_error(&partial, e))?;
        tokio::fs::rename(&partial, &destination)
            .await
            .map_err(|e| io_error(&destination, e))?;
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
