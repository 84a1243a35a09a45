//! Bundle-Harvest: an incremental catalog crawler
//!
//! This crate collects price, rating, tag and release-date records for catalog
//! entries and bundles, caching everything in SQLite under a content hash of the
//! canonical page URL so repeated runs never re-fetch what is already known.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod identity;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Fatal errors that abort a whole run
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised while turning a target reference into an identity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Unrecognized target kind: '{0}'")]
    UnknownKind(String),

    #[error("Target reference is empty")]
    EmptyReference,

    #[error("Target id is not numeric: '{0}'")]
    NonNumericId(String),
}

/// A parsed field is outside the range a record may hold
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite, non-negative amount, got {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("{field} must be a fraction in [0, 1], got {value}")]
    FractionOutOfRange { field: &'static str, value: f64 },
}

/// Target-local failure; recorded in the target's outcome, never fatal to a batch
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("Hash {hash} is stored for {stored_url}, not {requested_url}")]
    HashCollision {
        hash: String,
        stored_url: String,
        requested_url: String,
    },
}

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::CrawlOrchestrator;
pub use identity::{content_hash, IdentityResolver, ResolvedTarget, TargetKind, TargetRef};
pub use state::{CrawlOutcome, KnownIdentitySet};
pub use storage::{BundleRecord, EntryRecord, RecordStore, SqliteStore};
