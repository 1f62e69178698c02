use super::matches_wildcard;
use url::Url;

/// Hosts whose assets are localized even though they differ from the site host
///
/// Webflow serves uploaded images, stylesheets and scripts from these CDNs.
pub const DEFAULT_ASSET_HOSTS: &[&str] = &[
    "*.website-files.com",
    "*.webflow.com",
    "*.webflow.io",
];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use loco_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Decides which URLs belong to the mirrored site
///
/// Pages are in-domain when they share the starting URL's host and port.
/// Assets are in scope when their host is the site's base domain (without a
/// leading `www.`), one of its subdomains, or matches an asset-host pattern.
#[derive(Debug, Clone)]
pub struct SiteScope {
    host: String,
    port: Option<u16>,
    asset_patterns: Vec<String>,
}

impl SiteScope {
    /// Builds the scope for a starting URL plus extra asset-host patterns
    pub fn new(start: &Url, extra_asset_hosts: &[String]) -> Self {
        let host = extract_domain(start).unwrap_or_default();
        let base = host.strip_prefix("www.").unwrap_or(&host).to_string();

        let mut asset_patterns = vec![format!("*.{}", base)];
        asset_patterns.extend(DEFAULT_ASSET_HOSTS.iter().map(|p| p.to_string()));
        asset_patterns.extend(extra_asset_hosts.iter().cloned());

        Self {
            host,
            port: start.port_or_known_default(),
            asset_patterns,
        }
    }

    /// The starting host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true if `url` is a page of the mirrored site
    pub fn is_in_domain(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        extract_domain(url).as_deref() == Some(self.host.as_str())
            && url.port_or_known_default() == self.port
    }

    /// Returns true if an asset at `url` should be downloaded and rewritten
    pub fn is_asset_in_scope(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }
        match extract_domain(url) {
            Some(host) => self
                .asset_patterns
                .iter()
                .any(|pattern| matches_wildcard(pattern, &host)),
            None => false,
        }
    }
}
