//! Markup generated by the rewriter: meta tags, injected elements, fonts

use crate::config::{AttributeMap, InjectedTag};
use html_escape::encode_double_quoted_attribute;
use std::collections::{BTreeMap, BTreeSet};

/// Attribute value that renders as a bare boolean attribute
pub const NONE_VALUE: &str = "|NONE_VALUE|";

/// Attribute names whose value becomes the element's content
pub const INNER_CONTENT_KEYS: &[&str] = &["inner_html", "string", "str", "inline", "inline_script"];

/// Font map key that applies to the whole site
pub const SITE_FONT_KEY: &str = "site";

const GOOGLE_FONTS_CSS: &str = "https://fonts.googleapis.com/css2";
const GOOGLE_FONTS_WEIGHTS: &str = "wght@500;600;700";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Renders one element with its attributes and optional inner content
///
/// # Examples
///
/// ```
/// use loco_mirror::config::AttributeMap;
/// use loco_mirror::rewrite::render_element;
///
/// let attrs = AttributeMap::from([
///     ("async".to_string(), "|NONE_VALUE|".to_string()),
///     ("src".to_string(), "assets/a.js".to_string()),
/// ]);
/// assert_eq!(
///     render_element("script", &attrs),
///     r#"<script async src="assets/a.js"></script>"#
/// );
/// ```
pub fn render_element(tag: &str, attributes: &AttributeMap) -> String {
    let mut html = format!("<{}", tag);
    let mut inner = String::new();

    for (name, value) in attributes {
        if INNER_CONTENT_KEYS.contains(&name.as_str()) {
            inner.push_str(value);
        } else if value == NONE_VALUE {
            html.push(' ');
            html.push_str(name);
        } else {
            html.push_str(&format!(
                " {}=\"{}\"",
                name,
                encode_double_quoted_attribute(value)
            ));
        }
    }

    html.push('>');
    if !VOID_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str()) {
        html.push_str(&inner);
        html.push_str(&format!("</{}>", tag));
    }
    html
}

/// Renders a list of injected elements in order
pub fn render_injections(tags: &[InjectedTag]) -> String {
    tags.iter()
        .map(|t| render_element(&t.tag, &t.attributes))
        .collect()
}

/// Renders meta overrides as `<meta>` elements
pub fn render_meta(meta: &[AttributeMap]) -> String {
    meta.iter().map(|attrs| render_element("meta", attrs)).collect()
}

/// `name` or `property` identifying a meta element, lowercased
pub fn meta_key(attributes: &AttributeMap) -> Option<String> {
    attributes
        .get("name")
        .or_else(|| attributes.get("property"))
        .map(|v| v.to_ascii_lowercase())
}

/// CSS selector a font map key applies to
///
/// Platform names map to their element or class; any other key is used as
/// a selector as written.
pub fn font_target_selector(key: &str) -> &str {
    match key {
        SITE_FONT_KEY => "body",
        "navbar" => ".w-nav",
        "title" => "h1",
        "body" => "p",
        "code" => "code, pre",
        other => other,
    }
}

/// Google Fonts stylesheet URL for one family
///
/// # Examples
///
/// ```
/// use loco_mirror::rewrite::google_fonts_url;
///
/// assert_eq!(
///     google_fonts_url("Open Sans"),
///     "https://fonts.googleapis.com/css2?family=Open+Sans:wght@500;600;700&display=swap"
/// );
/// ```
pub fn google_fonts_url(family: &str) -> String {
    format!(
        "{}?family={}:{}&display=swap",
        GOOGLE_FONTS_CSS,
        family
            .split_whitespace()
            .map(|word| urlencoding::encode(word).into_owned())
            .collect::<Vec<_>>()
            .join("+"),
        GOOGLE_FONTS_WEIGHTS
    )
}

/// Stylesheet links and font rules for the configured font map
///
/// Every family gets one stylesheet link. The site font is a plain rule so
/// element rules can refine it; element fonts use `!important` to win over
/// the site's own stylesheet.
pub fn render_fonts(fonts: &BTreeMap<String, String>) -> String {
    if fonts.is_empty() {
        return String::new();
    }

    let families: BTreeSet<&str> = fonts.values().map(|f| f.trim()).collect();
    let mut html: String = families
        .iter()
        .map(|family| {
            format!(
                "<link href=\"{}\" rel=\"stylesheet\">",
                encode_double_quoted_attribute(&google_fonts_url(family))
            )
        })
        .collect();

    let mut rules = Vec::new();
    if let Some(site) = fonts.get(SITE_FONT_KEY) {
        rules.push(format!("body {{font-family:'{}'}}", site.trim()));
    }
    for (key, family) in fonts.iter().filter(|(k, _)| k.as_str() != SITE_FONT_KEY) {
        rules.push(format!(
            "{} {{font-family:'{}' !important}}",
            font_target_selector(key),
            family.trim()
        ));
    }
    html.push_str(&format!("<style>{}</style>", rules.join(" ")));
    html
}
