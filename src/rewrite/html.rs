//! Streaming rewrite of a rendered document with `lol_html`
//!
//! All decisions are made beforehand and stored in a `RewritePlan`; the
//! handlers here only look values up. Attribute values coming out of
//! `lol_html` are not entity-decoded, so every lookup decodes first.

use crate::cache::replace_css_urls;
use html_escape::decode_html_entities;
use lol_html::html_content::ContentType;
use lol_html::{element, HtmlRewriter, Settings};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// What happens to one `<a href>` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorAction {
    /// Point the link somewhere else
    Href(String),
    /// Turn the link into a `<span>`
    Span,
}

/// Every change to apply to one document
#[derive(Debug, Clone, Default)]
pub struct RewritePlan {
    pub remove_selectors: Vec<String>,
    pub strip_social_meta: bool,
    /// Script `src` values to drop
    pub removed_scripts: HashSet<String>,
    /// Meta `name`/`property` values replaced by overrides (lowercased)
    pub replaced_meta: HashSet<String>,
    /// `src`/`href` values of images, icons, stylesheets and scripts
    pub resources: HashMap<String, String>,
    /// Whole `srcset` values
    pub srcsets: HashMap<String, String>,
    /// `url()` values inside `style` attributes
    pub styles: HashMap<String, String>,
    pub anchors: HashMap<String, AnchorAction>,
    pub head_append: String,
    pub body_append: String,
}

const SOCIAL_META: &[&str] = &[
    "meta[property^=\"og:\"]",
    "meta[property^=\"fb:\"]",
    "meta[property^=\"article:\"]",
    "meta[name^=\"twitter:\"]",
    "meta[property^=\"twitter:\"]",
];

/// Applies `plan` to `html`, returning the new markup and the number of
/// elements removed
pub fn apply_plan(html: &str, plan: &RewritePlan) -> Result<(String, usize), String> {
    let mut output = Vec::with_capacity(html.len());
    let removed = Cell::new(0usize);

    let mut handlers = vec![
        element!("link[rel=\"canonical\"], meta[name=\"generator\"]", |el| {
            count_removal(el.removed(), &removed);
            el.remove();
            Ok(())
        }),
        element!("meta", |el| {
            let key = el
                .get_attribute("name")
                .or_else(|| el.get_attribute("property"))
                .map(|k| decode_html_entities(&k).to_ascii_lowercase());
            if key.is_some_and(|k| plan.replaced_meta.contains(&k)) {
                count_removal(el.removed(), &removed);
                el.remove();
            }
            Ok(())
        }),
        element!("script[src]", |el| {
            if let Some(src) = el.get_attribute("src") {
                let src = decode_html_entities(&src);
                if plan.removed_scripts.contains(src.trim()) {
                    count_removal(el.removed(), &removed);
                    el.remove();
                } else if let Some(local) = plan.resources.get(src.trim()) {
                    el.set_attribute("src", local)?;
                    el.remove_attribute("integrity");
                }
            }
            Ok(())
        }),
        element!("img[src], source[src]", |el| {
            if let Some(local) = lookup(&plan.resources, el.get_attribute("src")) {
                el.set_attribute("src", local)?;
            }
            Ok(())
        }),
        element!("img[srcset], source[srcset]", |el| {
            if let Some(local) = lookup(&plan.srcsets, el.get_attribute("srcset")) {
                el.set_attribute("srcset", local)?;
            }
            Ok(())
        }),
        element!("link[href]", |el| {
            if let Some(local) = lookup(&plan.resources, el.get_attribute("href")) {
                el.set_attribute("href", local)?;
                el.remove_attribute("integrity");
                el.remove_attribute("crossorigin");
            }
            Ok(())
        }),
        element!("[style]", |el| {
            if plan.styles.is_empty() {
                return Ok(());
            }
            if let Some(style) = el.get_attribute("style") {
                let style = decode_html_entities(&style);
                let rewritten = replace_css_urls(&style, &plan.styles);
                if rewritten != style {
                    el.set_attribute("style", &rewritten)?;
                }
            }
            Ok(())
        }),
        element!("a[href]", |el| {
            let href = el.get_attribute("href").unwrap_or_default();
            let href = decode_html_entities(&href);
            match plan.anchors.get(href.trim()) {
                Some(AnchorAction::Href(local)) => el.set_attribute("href", local)?,
                Some(AnchorAction::Span) => {
                    el.set_tag_name("span")?;
                    el.remove_attribute("href");
                    el.remove_attribute("target");
                }
                None => {}
            }
            Ok(())
        }),
        element!("head", |el| {
            if !plan.head_append.is_empty() {
                el.append(&plan.head_append, ContentType::Html);
            }
            Ok(())
        }),
        element!("body", |el| {
            if !plan.body_append.is_empty() {
                el.append(&plan.body_append, ContentType::Html);
            }
            Ok(())
        }),
    ];

    if plan.strip_social_meta {
        for selector in SOCIAL_META {
            handlers.push(element!(*selector, |el| {
                count_removal(el.removed(), &removed);
                el.remove();
                Ok(())
            }));
        }
    }

    for selector in &plan.remove_selectors {
        if selector.parse::<lol_html::Selector>().is_err() {
            warn!("Selector '{}' is not supported for removal, skipping", selector);
            continue;
        }
        handlers.push(element!(selector.as_str(), |el| {
            count_removal(el.removed(), &removed);
            el.remove();
            Ok(())
        }));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| format!("HTML rewrite error: {}", e))?;
    rewriter
        .end()
        .map_err(|e| format!("HTML rewrite finalization error: {}", e))?;

    let html = String::from_utf8(output).map_err(|e| format!("Invalid UTF-8 in rewritten HTML: {}", e))?;
    Ok((html, removed.get()))
}

/// Counts an element once even when several removal rules match it
fn count_removal(already_removed: bool, removed: &Cell<usize>) {
    if !already_removed {
        removed.set(removed.get() + 1);
    }
}

fn lookup<'a>(map: &'a HashMap<String, String>, raw: Option<String>) -> Option<&'a String> {
    let raw = raw?;
    map.get(decode_html_entities(&raw).trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str, plan: &RewritePlan) -> String {
        apply_plan(html, plan).unwrap().0
    }

    #[test]
    fn test_strips_platform_metadata() {
        let html = r#"<html><head><link rel="canonical" href="https://x.com/"><meta name="generator" content="Webflow"><meta property="og:title" content="T"></head><body></body></html>"#;
        let out = run(html, &RewritePlan::default());
        assert!(!out.contains("canonical"));
        assert!(!out.contains("generator"));
        assert!(out.contains("og:title"));

        let plan = RewritePlan {
            strip_social_meta: true,
            ..RewritePlan::default()
        };
        assert!(!run(html, &plan).contains("og:title"));
    }

    #[test]
    fn test_remove_selectors_and_scripts() {
        let html = r#"<html><head><script src="https://x.com/ads.js"></script></head><body><div class="w-webflow-badge">b</div><p>keep</p></body></html>"#;
        let plan = RewritePlan {
            remove_selectors: vec![".w-webflow-badge".to_string()],
            removed_scripts: HashSet::from(["https://x.com/ads.js".to_string()]),
            ..RewritePlan::default()
        };
        let (out, removed) = apply_plan(html, &plan).unwrap();
        assert!(!out.contains("w-webflow-badge"));
        assert!(!out.contains("ads.js"));
        assert!(out.contains("<p>keep</p>"));
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_element_matched_twice_counted_once() {
        let html = r#"<html><head><meta property="og:description" content="old"></head><body><div class="promo badge">x</div></body></html>"#;
        let plan = RewritePlan {
            strip_social_meta: true,
            replaced_meta: HashSet::from(["og:description".to_string()]),
            remove_selectors: vec![".promo".to_string(), ".badge".to_string()],
            ..RewritePlan::default()
        };
        let (out, removed) = apply_plan(html, &plan).unwrap();
        assert!(!out.contains("og:description"));
        assert!(!out.contains("promo"));
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_resources_rewritten_with_entity_decoding() {
        let html = r#"<html><head></head><body><img src="https://cdn.x.com/a.png?w=1&amp;h=2"></body></html>"#;
        let plan = RewritePlan {
            resources: HashMap::from([(
                "https://cdn.x.com/a.png?w=1&h=2".to_string(),
                "assets/abc.png".to_string(),
            )]),
            ..RewritePlan::default()
        };
        assert!(run(html, &plan).contains(r#"src="assets/abc.png""#));
    }

    #[test]
    fn test_style_urls_rewritten() {
        let html = r#"<html><body><div style="background-image: url(&quot;/img/hero.jpg&quot;)"></div></body></html>"#;
        let plan = RewritePlan {
            styles: HashMap::from([("/img/hero.jpg".to_string(), "assets/h.jpg".to_string())]),
            ..RewritePlan::default()
        };
        let out = run(html, &plan);
        assert!(out.contains("assets/h.jpg"));
        assert!(!out.contains("/img/hero.jpg"));
    }

    #[test]
    fn test_anchor_actions() {
        let html = r#"<html><body><a href="/about">A</a><a href="/blog" target="_blank">B</a><a href="https://ext.com">E</a></body></html>"#;
        let plan = RewritePlan {
            anchors: HashMap::from([
                ("/about".to_string(), AnchorAction::Href("about/index.html".to_string())),
                ("/blog".to_string(), AnchorAction::Span),
            ]),
            ..RewritePlan::default()
        };
        let out = run(html, &plan);
        assert!(out.contains(r#"<a href="about/index.html">A</a>"#));
        assert!(out.contains("<span>B</span>"));
        assert!(out.contains(r#"<a href="https://ext.com">E</a>"#));
    }

    #[test]
    fn test_head_and_body_append() {
        let html = "<html><head><title>t</title></head><body><p>x</p></body></html>";
        let plan = RewritePlan {
            head_append: r#"<meta name="author" content="me">"#.to_string(),
            body_append: "<script>go()</script>".to_string(),
            ..RewritePlan::default()
        };
        let out = run(html, &plan);
        assert!(out.contains(r#"<title>t</title><meta name="author" content="me"></head>"#));
        assert!(out.contains("<p>x</p><script>go()</script></body>"));
    }

    #[test]
    fn test_meta_override_replaces_existing() {
        let html = r#"<html><head><meta name="description" content="old"></head><body></body></html>"#;
        let plan = RewritePlan {
            replaced_meta: HashSet::from(["description".to_string()]),
            head_append: r#"<meta content="new" name="description">"#.to_string(),
            ..RewritePlan::default()
        };
        let out = run(html, &plan);
        assert!(!out.contains("old"));
        assert!(out.contains("new"));
    }
}
