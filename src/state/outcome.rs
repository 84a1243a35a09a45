/// Per-target outcomes and processing stages
///
/// Every target handed to the orchestrator ends in exactly one [`CrawlOutcome`].
use crate::storage::{BundleRecord, EntryRecord};
use crate::CrawlError;
use std::fmt;

/// A stored or freshly assembled record of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Entry(EntryRecord),
    Bundle(BundleRecord),
}

impl CatalogRecord {
    pub fn title(&self) -> &str {
        match self {
            Self::Entry(entry) => &entry.title,
            Self::Bundle(bundle) => &bundle.title,
        }
    }

    pub fn as_entry(&self) -> Option<&EntryRecord> {
        match self {
            Self::Entry(entry) => Some(entry),
            Self::Bundle(_) => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&BundleRecord> {
        match self {
            Self::Bundle(bundle) => Some(bundle),
            Self::Entry(_) => None,
        }
    }
}

/// Final result of processing one target
#[derive(Debug)]
pub enum CrawlOutcome {
    /// Served from the store; nothing was fetched
    CacheHit(CatalogRecord),

    /// Fetched, validated and written through the store
    FreshlyScraped(CatalogRecord),

    /// A bundle list was fetched and its bundles queued as targets
    Expanded { bundles: usize },

    /// The target failed; nothing was persisted
    Failed(CrawlError),
}

impl CrawlOutcome {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Self::CacheHit(_))
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::FreshlyScraped(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns true if a politeness delay must follow this outcome
    ///
    /// Only outcomes that touched the network pay the delay. Cache hits and
    /// targets that never resolved do not.
    pub fn applies_delay(&self) -> bool {
        match self {
            Self::CacheHit(_) => false,
            Self::Failed(CrawlError::Identity(_)) => false,
            Self::Failed(CrawlError::HashCollision { .. }) => false,
            _ => true,
        }
    }

    /// The record carried by a cache hit or a fresh scrape
    pub fn record(&self) -> Option<&CatalogRecord> {
        match self {
            Self::CacheHit(record) | Self::FreshlyScraped(record) => Some(record),
            _ => None,
        }
    }

    /// Short label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            Self::CacheHit(_) => "cache_hit",
            Self::FreshlyScraped(_) => "freshly_scraped",
            Self::Expanded { .. } => "expanded",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CacheHit(record) | Self::FreshlyScraped(record) => {
                write!(f, "{} ({})", self.label(), record.title())
            }
            Self::Expanded { bundles } => write!(f, "{} ({} bundles)", self.label(), bundles),
            Self::Failed(error) => write!(f, "{} ({})", self.label(), error),
        }
    }
}

/// Stages of the per-target state machine, for debug logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStage {
    Resolve,
    CacheCheck,
    Fetch,
    Persist,
    Done,
}

impl TargetStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::CacheCheck => "cache_check",
            Self::Fetch => "fetch",
            Self::Persist => "persist",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TargetStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
