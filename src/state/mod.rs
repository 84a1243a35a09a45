//! State module for tracking what a crawl already knows
//!
//! # Components
//!
//! - `KnownIdentitySet`: In-memory mirror of the hashes held by the record store
//! - `CrawlOutcome`: The result a target ends in (cache hit, fresh scrape, expansion, failure)
//! - `TargetStage`: Stages of the per-target state machine

mod known_set;
mod outcome;

// Re-export main types
pub use known_set::KnownIdentitySet;
pub use outcome::{CatalogRecord, CrawlOutcome, TargetStage};
