use std::collections::BTreeMap;
use url::Url;

/// A `[pages]` key that matched a URL
#[derive(Debug)]
pub struct TokenMatch<'a, V> {
    /// The winning key
    pub token: &'a str,
    /// The value stored under the winning key
    pub value: &'a V,
    /// Other keys that also matched and lost
    pub shadowed: Vec<&'a str>,
}

/// Finds the table entry whose key occurs in the URL
///
/// A key matches when its lowercase text is a substring of the lowercase URL.
/// When several keys match, the longest one wins; equal lengths fall back to
/// the lexicographically first key (the table is iterated in key order).
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use url::Url;
/// use loco_mirror::url::best_token_match;
///
/// let mut table = BTreeMap::new();
/// table.insert("blog".to_string(), 1);
/// table.insert("blog/launch".to_string(), 2);
///
/// let url = Url::parse("https://example.com/blog/launch-day").unwrap();
/// let hit = best_token_match(&table, &url).unwrap();
/// assert_eq!(hit.token, "blog/launch");
/// assert_eq!(*hit.value, 2);
/// ```
pub fn best_token_match<'a, V>(table: &'a BTreeMap<String, V>, url: &Url) -> Option<TokenMatch<'a, V>> {
    let haystack = url.as_str().to_lowercase();

    let mut best: Option<(&'a str, &'a V)> = None;
    let mut matched: Vec<&'a str> = Vec::new();

    for (key, value) in table {
        if key.is_empty() || !haystack.contains(&key.to_lowercase()) {
            continue;
        }
        matched.push(key.as_str());
        match best {
            Some((current, _)) if current.len() >= key.len() => {}
            _ => best = Some((key.as_str(), value)),
        }
    }

    best.map(|(token, value)| TokenMatch {
        token,
        value,
        shadowed: matched.into_iter().filter(|k| *k != token).collect(),
    })
}
