//! URL handling module for Loco-Mirror
//!
//! This module provides:
//! - URL canonicalization (the identity key for pages and assets)
//! - Host wildcard matching and site/asset scope decisions
//! - Page token matching for per-page configuration
//! - The `PathMapper`, which maps remote URLs onto files in the mirror
//! - The `PageDirectory`, which keeps those files unique across a run

mod directory;
mod domain;
mod matcher;
mod normalize;
mod path_mapper;
mod token;

// Re-export main functions
pub use directory::PageDirectory;
pub use domain::{extract_domain, SiteScope, DEFAULT_ASSET_HOSTS};
pub use matcher::matches_wildcard;
pub use normalize::{canonical_key, canonicalize, canonicalize_url};
pub use path_mapper::{
    hash_stem, is_asset_url, is_safe_relative_path, relative_href, url_extension, CacheName,
    PathMapper, ASSET_EXTENSIONS,
};
pub use token::{best_token_match, TokenMatch};

use url::Url;

/// Resolves a reference found in a document against the page URL
///
/// Returns `None` for references that never name a fetchable resource:
/// empty values, `data:`/`javascript:`/`mailto:`/`tel:` URIs, and anything
/// that fails to parse.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use loco_mirror::url::resolve_reference;
///
/// let base = Url::parse("https://example.com/blog/").unwrap();
/// let url = resolve_reference(&base, "../img/a.png").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/img/a.png");
/// assert!(resolve_reference(&base, "data:image/png;base64,AA").is_none());
/// ```
pub fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let lower = reference.to_ascii_lowercase();
    if ["data:", "javascript:", "mailto:", "tel:", "blob:", "about:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let url = base.join(reference).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolve_reference(&base(), "other").unwrap();
        assert_eq!(url.as_str(), "https://example.com/blog/other");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve_reference(&base(), "/about").unwrap();
        assert_eq!(url.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_resolve_protocol_relative() {
        let url = resolve_reference(&base(), "//cdn.example.com/a.png").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_resolve_skips_non_fetchable() {
        assert!(resolve_reference(&base(), "").is_none());
        assert!(resolve_reference(&base(), "mailto:a@b.c").is_none());
        assert!(resolve_reference(&base(), "JavaScript:void(0)").is_none());
        assert!(resolve_reference(&base(), "ftp://example.com/x").is_none());
    }

    #[test]
    fn test_fragment_only_resolves_to_page() {
        let url = resolve_reference(&base(), "#team").unwrap();
        assert_eq!(url.fragment(), Some("team"));
        assert_eq!(canonical_key(&url), "https://example.com/blog/post");
    }
}
