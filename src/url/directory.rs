//! Run-wide assignment of pages to files
//!
//! `PathMapper` proposes a file for every page URL. Overrides match by token,
//! so two URLs can propose the same file; the first URL to be assigned keeps
//! it and every later one gets its `@<hash>` variant.

use super::normalize::canonical_key;
use super::PathMapper;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use url::Url;

#[derive(Debug, Default)]
struct Assignments {
    by_url: HashMap<String, PathBuf>,
    owners: HashMap<PathBuf, String>,
}

/// First-come registry of page files shared by the engine and the rewriter
#[derive(Debug)]
pub struct PageDirectory {
    mapper: PathMapper,
    assignments: Mutex<Assignments>,
}

impl PageDirectory {
    pub fn new(mapper: PathMapper) -> Self {
        Self {
            mapper,
            assignments: Mutex::new(Assignments::default()),
        }
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Returns the file for `url`, assigning one on first sight
    ///
    /// The same URL always gets the same file, and no two URLs share one.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use std::path::PathBuf;
    /// use url::Url;
    /// use loco_mirror::url::PageDirectory;
    /// use loco_mirror::PathMapper;
    ///
    /// let start = Url::parse("https://example.com/").unwrap();
    /// let overrides = BTreeMap::from([("about".to_string(), PathBuf::from("about-us.html"))]);
    /// let directory = PageDirectory::new(PathMapper::new(&start).with_overrides(overrides));
    ///
    /// let about = directory.assign(&Url::parse("https://example.com/about").unwrap());
    /// let team = directory.assign(&Url::parse("https://example.com/about/team").unwrap());
    /// assert_eq!(about, PathBuf::from("about-us.html"));
    /// assert_ne!(team, about);
    /// ```
    pub fn assign(&self, url: &Url) -> PathBuf {
        let key = canonical_key(url);
        let mut assignments = self
            .assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(path) = assignments.by_url.get(&key) {
            return path.clone();
        }

        let mut path = self.mapper.to_local_path(url);
        if let Some(owner) = assignments.owners.get(&path) {
            let alternative = self.mapper.disambiguate(url, &path);
            debug!(
                "{} already holds {}, using {} for {}",
                owner,
                path.display(),
                alternative.display(),
                key
            );
            path = alternative;
        }

        assignments.owners.entry(path.clone()).or_insert_with(|| key.clone());
        assignments.by_url.insert(key, path.clone());
        path
    }

    /// The URL currently holding `path`, if any
    pub fn owner(&self, path: &Path) -> Option<String> {
        self.assignments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .owners
            .get(path)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn directory() -> PageDirectory {
        let start = Url::parse("https://example.com/").unwrap();
        let overrides = BTreeMap::from([("about".to_string(), PathBuf::from("about-us.html"))]);
        PageDirectory::new(PathMapper::new(&start).with_overrides(overrides))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_first_claimant_keeps_override() {
        let directory = directory();
        let about = directory.assign(&url("https://example.com/about"));
        let team = directory.assign(&url("https://example.com/about/team"));

        assert_eq!(about, PathBuf::from("about-us.html"));
        assert_ne!(team, about);
        assert!(team.to_string_lossy().starts_with("about-us@"));
        assert_eq!(
            directory.owner(Path::new("about-us.html")).as_deref(),
            Some("https://example.com/about")
        );
    }

    #[test]
    fn test_assignment_is_stable() {
        let directory = directory();
        let team = directory.assign(&url("https://example.com/about/team"));
        directory.assign(&url("https://example.com/about"));

        assert_eq!(directory.assign(&url("https://example.com/about/team/")), team);
        assert_eq!(team, PathBuf::from("about-us.html"));
    }

    #[test]
    fn test_plain_pages_unaffected() {
        let directory = directory();
        assert_eq!(directory.assign(&url("https://example.com/")), PathBuf::from("index.html"));
        assert_eq!(
            directory.assign(&url("https://example.com/pricing")),
            PathBuf::from("pricing/index.html")
        );
    }
}
