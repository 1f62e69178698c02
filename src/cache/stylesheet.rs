//! `url()` references inside stylesheets
//!
//! Stylesheets are scanned in two passes: collect every `url()` reference
//! (noting whether it sits inside an `@font-face` rule), then substitute the
//! references that were localized.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// One `url()` reference found in a stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssReference {
    /// The reference exactly as written, without quotes
    pub raw: String,
    /// True when the reference is inside an `@font-face` block
    pub in_font_face: bool,
}

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("hardcoded regex pattern is valid")
});

static FONT_FACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)@font-face\s*\{[^}]*\}").expect("hardcoded regex pattern is valid")
});

/// Collects the distinct `url()` references of a stylesheet in source order
///
/// `data:` URIs and fragment-only references (`url(#clip)`) are skipped.
///
/// # Examples
///
/// ```
/// use loco_mirror::cache::collect_css_urls;
///
/// let css = "@font-face { src: url('a.woff2') } body { background: url(bg.png) }";
/// let refs = collect_css_urls(css);
/// assert_eq!(refs.len(), 2);
/// assert!(refs[0].in_font_face);
/// assert!(!refs[1].in_font_face);
/// ```
pub fn collect_css_urls(css: &str) -> Vec<CssReference> {
    let font_faces: Vec<(usize, usize)> = FONT_FACE_RE
        .find_iter(css)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut seen = HashSet::new();
    let mut references = Vec::new();

    for caps in URL_RE.captures_iter(css) {
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1).or(caps.get(2)).or(caps.get(3)))
        else {
            continue;
        };
        let raw = value.as_str().trim();
        if raw.is_empty() || raw.starts_with('#') || raw.to_ascii_lowercase().starts_with("data:") {
            continue;
        }

        let in_font_face = font_faces
            .iter()
            .any(|(start, end)| whole.start() >= *start && whole.end() <= *end);

        if seen.insert(raw.to_string()) {
            references.push(CssReference {
                raw: raw.to_string(),
                in_font_face,
            });
        }
    }

    references
}

/// Replaces `url()` references whose raw value appears in `replacements`
///
/// Replaced references are written as `url("<new>")`; everything else is
/// left byte for byte.
pub fn replace_css_urls(css: &str, replacements: &HashMap<String, String>) -> String {
    if replacements.is_empty() {
        return css.to_string();
    }

    URL_RE
        .replace_all(css, |caps: &regex::Captures| {
            let value = caps
                .get(1)
                .or(caps.get(2))
                .or(caps.get(3))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            match replacements.get(value) {
                Some(new) => format!("url(\"{}\")", new),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Extracts `url()` references from an inline `style` attribute
pub fn style_attribute_urls(style: &str) -> Vec<String> {
    collect_css_urls(style).into_iter().map(|r| r.raw).collect()
}
