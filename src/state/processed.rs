use super::PageState;
use crate::MirrorError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// What is known about one page of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub url: String,
    pub state: PageState,
    /// File the page maps to, relative to the output directory
    pub local_path: PathBuf,
    /// Failure reason for `Failed` pages
    pub error: Option<String>,
}

/// Outcome of offering a URL to the processed set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The URL is new and now `Scheduled`
    Scheduled,
    /// The URL was already scheduled or completed
    AlreadyKnown,
    /// Another URL already claimed the same local path
    PathTaken { owner: String },
}

/// Every page scheduled or completed during a run
///
/// Keys are canonical URL strings. Entries are never removed, and insertion
/// order is kept so reports list pages in the order they were discovered.
#[derive(Debug, Default)]
pub struct ProcessedPages {
    records: Vec<PageRecord>,
    index: HashMap<String, usize>,
    paths: HashMap<PathBuf, String>,
    skipped: Vec<String>,
    skipped_seen: HashSet<String>,
}

impl ProcessedPages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a canonical URL mapped to `local_path`
    ///
    /// A URL is admitted at most once, and a local path can belong to only
    /// one URL.
    pub fn schedule(&mut self, url: &str, local_path: &Path) -> Admission {
        if self.index.contains_key(url) {
            return Admission::AlreadyKnown;
        }
        if let Some(owner) = self.paths.get(local_path) {
            return Admission::PathTaken {
                owner: owner.clone(),
            };
        }

        self.index.insert(url.to_string(), self.records.len());
        self.paths.insert(local_path.to_path_buf(), url.to_string());
        self.records.push(PageRecord {
            url: url.to_string(),
            state: PageState::Scheduled,
            local_path: local_path.to_path_buf(),
            error: None,
        });
        Admission::Scheduled
    }

    /// Records a page that could not be given a file of its own
    ///
    /// The page is entered directly as `Failed` and claims no path.
    pub fn reject(&mut self, url: &str, local_path: &Path, reason: impl Into<String>) {
        if self.index.contains_key(url) {
            return;
        }
        self.index.insert(url.to_string(), self.records.len());
        self.records.push(PageRecord {
            url: url.to_string(),
            state: PageState::Failed,
            local_path: local_path.to_path_buf(),
            error: Some(reason.into()),
        });
    }

    /// Moves a page to its next state
    pub fn transition(&mut self, url: &str, next: PageState) -> Result<(), MirrorError> {
        let record = self.record_mut(url)?;
        if !record.state.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                url: url.to_string(),
                from: record.state,
                to: next,
            });
        }
        record.state = next;
        Ok(())
    }

    /// Marks a page `Failed` with a reason
    pub fn fail(&mut self, url: &str, reason: impl Into<String>) -> Result<(), MirrorError> {
        self.transition(url, PageState::Failed)?;
        if let Some(&i) = self.index.get(url) {
            self.records[i].error = Some(reason.into());
        }
        Ok(())
    }

    /// Records a link that was refused because it leaves the site
    pub fn note_out_of_domain(&mut self, url: &str) {
        if self.skipped_seen.insert(url.to_string()) {
            self.skipped.push(url.to_string());
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<&PageRecord> {
        self.index.get(url).map(|&i| &self.records[i])
    }

    /// All records in scheduling order
    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Out-of-domain links refused during the run, first sighting order
    pub fn skipped_out_of_domain(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of pages currently in `state`
    pub fn count(&self, state: PageState) -> usize {
        if state == PageState::SkippedOutOfDomain {
            return self.skipped.len();
        }
        self.records.iter().filter(|r| r.state == state).count()
    }

    fn record_mut(&mut self, url: &str) -> Result<&mut PageRecord, MirrorError> {
        match self.index.get(url) {
            Some(&i) => Ok(&mut self.records[i]),
            None => Err(MirrorError::UnknownPage(url.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "https://example.com/";
    const ABOUT: &str = "https://example.com/about";

    #[test]
    fn test_schedule_once() {
        let mut pages = ProcessedPages::new();
        assert_eq!(pages.schedule(HOME, Path::new("index.html")), Admission::Scheduled);
        assert_eq!(pages.schedule(HOME, Path::new("index.html")), Admission::AlreadyKnown);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.get(HOME).unwrap().state, PageState::Scheduled);
    }

    #[test]
    fn test_path_collision_is_refused() {
        let mut pages = ProcessedPages::new();
        pages.schedule(HOME, Path::new("index.html"));
        assert_eq!(
            pages.schedule(ABOUT, Path::new("index.html")),
            Admission::PathTaken {
                owner: HOME.to_string()
            }
        );
        assert!(!pages.contains(ABOUT));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut pages = ProcessedPages::new();
        pages.schedule(HOME, Path::new("index.html"));
        pages.transition(HOME, PageState::Rendering).unwrap();
        pages.transition(HOME, PageState::Rewriting).unwrap();
        pages.transition(HOME, PageState::Exported).unwrap();
        assert_eq!(pages.count(PageState::Exported), 1);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut pages = ProcessedPages::new();
        pages.schedule(HOME, Path::new("index.html"));
        let err = pages.transition(HOME, PageState::Exported).unwrap_err();
        assert!(matches!(err, MirrorError::InvalidTransition { .. }));
        assert_eq!(pages.get(HOME).unwrap().state, PageState::Scheduled);
    }

    #[test]
    fn test_fail_records_reason() {
        let mut pages = ProcessedPages::new();
        pages.schedule(ABOUT, Path::new("about/index.html"));
        pages.transition(ABOUT, PageState::Rendering).unwrap();
        pages.fail(ABOUT, "timed out").unwrap();
        let record = pages.get(ABOUT).unwrap();
        assert_eq!(record.state, PageState::Failed);
        assert_eq!(record.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_rejected_page_fails_without_claiming_path() {
        let mut pages = ProcessedPages::new();
        pages.schedule(HOME, Path::new("index.html"));
        pages.reject(ABOUT, Path::new("index.html"), "index.html already belongs to home");

        let record = pages.get(ABOUT).unwrap();
        assert_eq!(record.state, PageState::Failed);
        assert!(record.error.as_deref().unwrap().contains("already belongs"));
        assert_eq!(pages.count(PageState::Failed), 1);
        assert_eq!(
            pages.schedule(ABOUT, Path::new("about/index.html")),
            Admission::AlreadyKnown
        );
        assert_eq!(pages.get(HOME).unwrap().state, PageState::Scheduled);
    }

    #[test]
    fn test_unknown_url_transition_fails() {
        let mut pages = ProcessedPages::new();
        assert!(pages.transition(ABOUT, PageState::Rendering).is_err());
    }

    #[test]
    fn test_out_of_domain_not_entered() {
        let mut pages = ProcessedPages::new();
        pages.note_out_of_domain("https://other.com/");
        pages.note_out_of_domain("https://other.com/");
        assert!(!pages.contains("https://other.com/"));
        assert_eq!(pages.count(PageState::SkippedOutOfDomain), 1);
        assert!(pages.is_empty());
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let mut pages = ProcessedPages::new();
        pages.schedule(ABOUT, Path::new("about/index.html"));
        pages.schedule(HOME, Path::new("index.html"));
        let urls: Vec<&str> = pages.records().iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec![ABOUT, HOME]);
    }
}
