use crate::UrlError;
use url::Url;

/// Tracking query parameters that never identify a distinct page or asset
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "_ga", "_gl"];

/// Canonicalizes a URL string into the identity key used for de-duplication
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Strip the port when it is the scheme's default
/// 4. Normalize path:
///    - Decode percent-encoded unreserved characters
///    - Remove empty and dot segments
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment (same-page anchors never name a distinct page)
/// 6. Remove tracking query parameters, sort the rest, drop an empty query
///
/// # Examples
///
/// ```
/// use loco_mirror::url::canonicalize;
///
/// let url = canonicalize("https://EXAMPLE.COM:443/about/#team").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// ```
pub fn canonicalize(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_url(url)
}

/// Canonicalizes an already parsed URL
pub fn canonicalize_url(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    if url.port().is_some() && url.port() == default_port(url.scheme()) {
        url.set_port(None)
            .map_err(|_| UrlError::Malformed(format!("Cannot strip port from {}", url)))?;
    }

    let normalized_path = normalize_path(&decode_unreserved(url.path()));
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Returns the canonical string form of a URL, or the raw string when it
/// cannot be canonicalized (used as a cache key for odd but fetchable URLs)
pub fn canonical_key(url: &Url) -> String {
    canonicalize_url(url.clone())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Decodes `%XX` triplets that encode RFC 3986 unreserved characters
///
/// Other triplets stay encoded with their hex digits upper-cased.
fn decode_unreserved(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let Some(triplet) = rest.get(pos..pos + 3) else {
            out.push('%');
            rest = &rest[pos + 1..];
            continue;
        };
        match urlencoding::decode(triplet) {
            Ok(decoded) if is_unreserved(&decoded) => out.push_str(&decoded),
            _ => {
                out.push('%');
                out.push_str(&triplet[1..].to_ascii_uppercase());
            }
        }
        rest = &rest[pos + 3..];
    }

    out.push_str(rest);
    out
}

fn is_unreserved(decoded: &str) -> bool {
    let mut chars = decoded.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
    )
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
