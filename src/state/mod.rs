//! State module for tracking mirror progress
//!
//! This module provides state management for pages during a run.
//!
//! # Components
//!
//! - `PageState`: Tracks the state of individual pages (scheduled, rendering, exported, etc.)
//! - `ProcessedPages`: The run's visited map, keyed by canonical URL

mod page_state;
mod processed;

// Re-export main types
pub use page_state::PageState;
pub use processed::{Admission, PageRecord, ProcessedPages};
