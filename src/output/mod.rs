//! Output module for writing the mirror and reporting on it
//!
//! This module handles:
//! - Writing cleaned pages into the output tree, all-or-nothing
//! - Preparing the destination (`--clean`, `--clean-css`, `--clean-js`)
//! - Summarizing a run

mod exporter;
pub mod stats;

pub use exporter::{CleanOptions, Exporter};
pub use stats::{print_summary, FailedPage, RunSummary};
