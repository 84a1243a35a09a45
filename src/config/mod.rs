//! Configuration module for Bundle-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use bundle_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Records stay fresh for {} days", config.crawler.staleness_days);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CatalogConfig, Config, CrawlerConfig, OutputConfig, TargetEntry, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

use crate::identity::TargetRef;

impl Config {
    /// Targets listed in the config file, in file order
    pub fn target_refs(&self) -> Vec<TargetRef> {
        self.targets
            .iter()
            .map(|t| TargetRef::new(&t.kind, &t.reference))
            .collect()
    }
}
