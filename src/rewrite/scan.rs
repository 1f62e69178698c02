//! Read-only pass over a rendered document
//!
//! Collects every reference the rewriter may localize. Elements that the
//! page's removal rules will delete are skipped along with their subtree so
//! nothing inside them is downloaded or followed.

use crate::cache::style_attribute_urls;
use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// References found in one document, as written in the markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// `<base href>` if present
    pub base_href: Option<String>,
    /// `<img src>`, `<source src>` and icon `<link href>` values
    pub images: Vec<String>,
    /// Whole `srcset` attribute values
    pub srcsets: Vec<String>,
    /// `url()` values from inline `style` attributes
    pub style_urls: Vec<String>,
    /// `<link rel=stylesheet href>` values
    pub stylesheets: Vec<String>,
    /// `<script src>` values
    pub scripts: Vec<String>,
    /// `<a href>` values
    pub anchors: Vec<String>,
}

/// Scans `html`, ignoring subtrees matched by `remove_selectors`
///
/// Selectors that fail to parse are ignored here; configuration validation
/// rejects them before a crawl starts.
pub fn scan_document(html: &str, remove_selectors: &[String]) -> ScanReport {
    let document = Html::parse_document(html);
    let scan = Scan::new(&document, remove_selectors);

    let mut report = ScanReport {
        base_href: scan
            .select("base[href]")
            .into_iter()
            .find_map(|e| e.value().attr("href"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        ..ScanReport::default()
    };

    scan.collect("img[src], source[src]", "src", &mut report.images);
    for element in scan.select("link[rel][href]") {
        let rel = element.value().attr("rel").unwrap_or_default();
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let rels: Vec<String> = rel
            .split_ascii_whitespace()
            .map(|r| r.to_ascii_lowercase())
            .collect();
        if rels.iter().any(|r| r == "stylesheet") {
            push_unique(&mut report.stylesheets, href);
        } else if rels.iter().any(|r| r == "icon" || r == "apple-touch-icon") {
            push_unique(&mut report.images, href);
        }
    }
    scan.collect("img[srcset], source[srcset]", "srcset", &mut report.srcsets);
    scan.collect("script[src]", "src", &mut report.scripts);
    scan.collect("a[href]", "href", &mut report.anchors);

    for element in scan.select("[style]") {
        if let Some(style) = element.value().attr("style") {
            for url in style_attribute_urls(style) {
                push_unique(&mut report.style_urls, &url);
            }
        }
    }

    report
}

/// Splits a `srcset` value into (url, descriptor) candidates
pub fn parse_srcset(srcset: &str) -> Vec<(String, Option<String>)> {
    srcset
        .split(',')
        .filter_map(|candidate| {
            let mut parts = candidate.split_ascii_whitespace();
            let url = parts.next()?.to_string();
            let descriptor = parts.collect::<Vec<_>>().join(" ");
            Some((url, Some(descriptor).filter(|d| !d.is_empty())))
        })
        .collect()
}

/// A parsed document together with the roots of its removed subtrees
struct Scan<'a> {
    document: &'a Html,
    removed: HashSet<NodeId>,
}

impl<'a> Scan<'a> {
    fn new(document: &'a Html, remove_selectors: &[String]) -> Self {
        let removed = remove_selectors
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .flat_map(|selector| document.select(&selector).map(|e| e.id()).collect::<Vec<_>>())
            .collect();
        Self { document, removed }
    }

    /// Elements matching `selector` that survive the removal rules
    fn select(&self, selector: &str) -> Vec<ElementRef<'a>> {
        let Ok(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.document
            .select(&selector)
            .filter(|element| !self.is_removed(element))
            .collect()
    }

    fn is_removed(&self, element: &ElementRef<'a>) -> bool {
        self.removed.contains(&element.id())
            || element.ancestors().any(|node| self.removed.contains(&node.id()))
    }

    fn collect(&self, selector: &str, attr: &str, out: &mut Vec<String>) {
        for element in self.select(selector) {
            if let Some(value) = element.value().attr(attr) {
                push_unique(out, value);
            }
        }
    }
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !out.iter().any(|v| v == value) {
        out.push(value.to_string());
    }
}
