/// Checks if a host matches a wildcard pattern
///
/// This function supports three types of patterns:
/// 1. Match-all: "*" matches every host
/// 2. Exact match: "example.com" matches only "example.com"
/// 3. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "cdn.example.com" (single subdomain)
///    - "assets.v2.example.com" (nested subdomains)
///
/// Matching is case-insensitive.
///
/// # Examples
///
/// ```
/// use loco_mirror::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "other.com"));
///
/// assert!(matches_wildcard("*.website-files.com", "cdn.prod.website-files.com"));
/// assert!(!matches_wildcard("*.website-files.com", "website-files.org"));
/// assert!(matches_wildcard("*", "anything.net"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    if pattern == "*" {
        return true;
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(matches_wildcard("site.webflow.io", "site.webflow.io"));
    }

    #[test]
    fn test_exact_no_match() {
        assert!(!matches_wildcard("example.com", "other.com"));
        assert!(!matches_wildcard("example.com", "cdn.example.com"));
        assert!(!matches_wildcard("cdn.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_base_and_subdomains() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "cdn.example.com"));
        assert!(matches_wildcard("*.example.com", "a.b.example.com"));
    }

    #[test]
    fn test_wildcard_rejects_suffix_lookalikes() {
        assert!(!matches_wildcard("*.example.com", "badexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.evil.org"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_wildcard("*.Example.COM", "CDN.example.com"));
    }

    #[test]
    fn test_match_all() {
        assert!(matches_wildcard("*", "fonts.gstatic.com"));
    }
}
