//! Mapping from remote URLs to files inside the mirror
//!
//! Every page URL maps to exactly one HTML file and every asset URL to one
//! cache filename. The mapping is a pure function of the canonical URL, the
//! starting URL and the configured path overrides, so repeated runs produce
//! the same tree.

use super::best_token_match;
use super::normalize::canonical_key;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// File extensions that identify a URL as an asset rather than a page
pub const ASSET_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp", "tif", "tiff",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // code
    "css", "js", "mjs", "json", "map", "xml", "txt",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "rtf",
    // archives
    "zip", "gz", "tgz", "rar", "7z", "tar",
    // media
    "mp4", "webm", "mov", "avi", "mp3", "wav", "ogg", "m4a", "lottie",
];

/// Length of the hex hash used in cache names and `@` suffixes
const HASH_LEN: usize = 16;

/// Name of the file every page directory is written to
const INDEX_FILE: &str = "index.html";

/// Cache filename split into stem and (optional) extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheName {
    pub stem: String,
    pub extension: Option<String>,
}

impl CacheName {
    /// Full filename, using `fallback` when no extension is known
    pub fn file_name(&self, fallback: &str) -> String {
        format!("{}.{}", self.stem, self.extension.as_deref().unwrap_or(fallback))
    }
}

/// Maps remote URLs to local paths relative to the output directory
#[derive(Debug, Clone)]
pub struct PathMapper {
    start: Url,
    overrides: BTreeMap<String, PathBuf>,
}

impl PathMapper {
    /// Creates a mapper rooted at the (canonical) starting URL
    pub fn new(start: &Url) -> Self {
        Self {
            start: canonical_url(start),
            overrides: BTreeMap::new(),
        }
    }

    /// Adds page path overrides keyed by URL token
    pub fn with_overrides(mut self, overrides: BTreeMap<String, PathBuf>) -> Self {
        self.overrides = overrides;
        self
    }

    /// The canonical starting URL
    pub fn start(&self) -> &Url {
        &self.start
    }

    /// Maps a page URL to its HTML file
    ///
    /// # Mapping Rules
    ///
    /// - The starting URL maps to `index.html`
    /// - A configured override is used verbatim
    /// - `/docs/intro.html` maps to `docs/intro.html`
    /// - `/about` maps to `about/index.html`
    ///
    /// When a segment had to be sanitized, the URL has a query, a different
    /// scheme or port than the start, or would otherwise land on an
    /// `index.html` reserved for another URL, the last component gets an
    /// `@<hash>` suffix derived from the full canonical URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use url::Url;
    /// use loco_mirror::PathMapper;
    ///
    /// let mapper = PathMapper::new(&Url::parse("https://example.com/").unwrap());
    /// let about = Url::parse("https://example.com/about/").unwrap();
    /// assert_eq!(mapper.to_local_path(&about), PathBuf::from("about/index.html"));
    /// ```
    pub fn to_local_path(&self, url: &Url) -> PathBuf {
        let canonical = canonical_url(url);

        if canonical == self.start {
            return PathBuf::from(INDEX_FILE);
        }

        if let Some(hit) = best_token_match(&self.overrides, &canonical) {
            return hit.value.clone();
        }

        let raw_segments: Vec<&str> = canonical
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let mut needs_suffix = canonical.query().is_some()
            || canonical.scheme() != self.start.scheme()
            || canonical.port_or_known_default() != self.start.port_or_known_default()
            || raw_segments.is_empty();

        let mut segments: Vec<String> = Vec::with_capacity(raw_segments.len());
        for raw in &raw_segments {
            let clean = sanitize_segment(raw);
            if clean != *raw {
                needs_suffix = true;
            }
            segments.push(clean);
        }

        let file_style = segments
            .last()
            .map(|last| has_html_extension(last))
            .unwrap_or(false);

        if file_style {
            let last = segments.pop().unwrap_or_default();
            let (stem, ext) = split_extension(&last);
            if stem.eq_ignore_ascii_case("index") {
                needs_suffix = true;
            }
            let file = if needs_suffix {
                format!("{}@{}.{}", stem, short_hash(canonical.as_str()), ext)
            } else {
                last.clone()
            };
            let mut path: PathBuf = segments.iter().collect();
            path.push(file);
            return path;
        }

        if needs_suffix {
            let tag = format!("@{}", short_hash(canonical.as_str()));
            match segments.last_mut() {
                Some(last) => last.push_str(&tag),
                None => return PathBuf::from(format!("index{}.html", tag)),
            }
        }

        let mut path: PathBuf = segments.iter().collect();
        path.push(INDEX_FILE);
        path
    }

    /// Variant of `path` carrying the `@<hash>` suffix of `url`
    ///
    /// Used when `path` already belongs to another page. The suffix goes on
    /// the page directory for `…/index.html` and on the file stem otherwise.
    pub fn disambiguate(&self, url: &Url, path: &Path) -> PathBuf {
        let tag = format!("@{}", short_hash(canonical_url(url).as_str()));
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name == INDEX_FILE {
            if let Some(dir) = parent.file_name() {
                let dir = format!("{}{}", dir.to_string_lossy(), tag);
                return parent.with_file_name(dir).join(INDEX_FILE);
            }
        }

        let (stem, ext) = split_extension(&name);
        let file = if ext.is_empty() {
            format!("{}{}", name, tag)
        } else {
            format!("{}{}.{}", stem, tag, ext)
        };
        parent.join(file)
    }

    /// Computes the cache filename for an asset
    ///
    /// Without an explicit name the stem is a hash of the canonical URL
    /// (including its sorted query). An explicit name is sanitized and any
    /// extension it carries is kept. The extension comes from the explicit
    /// hint, then from the URL path; an encoded `?` (`%3f`) and everything
    /// after it is dropped first.
    pub fn to_cache_name(
        &self,
        asset_url: &Url,
        explicit_name: Option<&str>,
        explicit_extension: Option<&str>,
    ) -> CacheName {
        let hint = explicit_extension
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| is_plausible_extension(e));

        if let Some(name) = explicit_name.map(sanitize_segment).filter(|n| !n.is_empty()) {
            let (stem, ext) = split_extension(&name);
            let from_name = Some(ext.to_ascii_lowercase()).filter(|e| is_plausible_extension(e));
            return CacheName {
                stem: if from_name.is_some() { stem.to_string() } else { name.clone() },
                extension: hint.or(from_name),
            };
        }

        CacheName {
            stem: hash_stem(asset_url),
            extension: hint.or_else(|| url_extension(asset_url)),
        }
    }
}

/// Hash stem used for an asset URL
pub fn hash_stem(url: &Url) -> String {
    short_hash(&canonical_key(url))
}

/// Returns true if the URL path ends in a recognized asset extension
pub fn is_asset_url(url: &Url) -> bool {
    url_extension(url)
        .map(|ext| ASSET_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Extension of the URL's last path segment, lowercased
///
/// An encoded query marker (`%3f`) and everything after it are ignored.
pub fn url_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    let lower = last.to_ascii_lowercase();
    let trimmed = lower.split("%3f").next().unwrap_or_default();
    let (stem, ext) = split_extension(trimmed);
    if stem.is_empty() || ext.is_empty() || !is_plausible_extension(ext) {
        return None;
    }
    Some(ext.to_string())
}

/// Relative reference from one file in the mirror to another
///
/// Both paths are relative to the output directory. With `with_extension`
/// false a target `…/index.html` is linked as its directory.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use loco_mirror::url::relative_href;
///
/// let href = relative_href(Path::new("blog/post/index.html"), Path::new("assets/a.png"), true);
/// assert_eq!(href, "../../assets/a.png");
/// ```
pub fn relative_href(from_file: &Path, target: &Path, with_extension: bool) -> String {
    let from_dir = from_file.parent().unwrap_or_else(|| Path::new(""));

    let (target, dir_form) = match target.file_name() {
        Some(name) if !with_extension && name == INDEX_FILE => {
            (target.parent().unwrap_or_else(|| Path::new("")), true)
        }
        _ => (target, false),
    };

    let relative = pathdiff::diff_paths(target, from_dir).unwrap_or_else(|| target.to_path_buf());
    let mut href = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if dir_form {
        if href.is_empty() {
            href.push_str("./");
        } else {
            href.push('/');
        }
    }
    href
}

/// Returns true if a configured override is a safe relative file path
pub fn is_safe_relative_path(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn canonical_url(url: &Url) -> Url {
    Url::parse(&canonical_key(url)).unwrap_or_else(|_| url.clone())
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '~' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn has_html_extension(segment: &str) -> bool {
    let (stem, ext) = split_extension(segment);
    !stem.is_empty() && (ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => (name, ""),
    }
}

fn is_plausible_extension(ext: &str) -> bool {
    (1..=6).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
