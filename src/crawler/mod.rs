//! Crawler module for target processing
//!
//! This module contains the core crawling logic, including:
//! - The per-target state machine and batch loop
//! - Record assembly and validation from extracted fields
//! - Politeness pacing between live fetches

mod orchestrator;
mod pacing;
mod records;

pub use orchestrator::{BatchReport, CacheStatus, CrawlOrchestrator, TargetReport};
pub use pacing::PolitenessDelay;
pub use records::{build_bundle, build_entry};
