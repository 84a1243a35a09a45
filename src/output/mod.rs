//! Output module for run summaries and store reports
//!
//! This module handles:
//! - Printing the outcome of a batch
//! - Store statistics for the `--stats` command

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, CatalogStatistics};
pub use summary::{exit_code, format_run_summary, print_run_summary};
