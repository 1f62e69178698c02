//! Breadth-first work queue of pages to mirror

use std::collections::VecDeque;
use url::Url;

/// A page waiting to be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPage {
    /// Canonical page URL
    pub url: Url,

    /// Link distance from the starting page
    pub depth: u32,
}

/// FIFO queue of scheduled pages
///
/// Admission control lives in `ProcessedPages`; the queue only keeps order,
/// so pages are visited level by level from the starting URL.
#[derive(Debug, Default)]
pub struct WorkQueue {
    frontier: VecDeque<QueuedPage>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: QueuedPage) {
        self.frontier.push_back(page);
    }

    /// Takes the oldest scheduled page
    pub fn next_page(&mut self) -> Option<QueuedPage> {
        self.frontier.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frontier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }
}
