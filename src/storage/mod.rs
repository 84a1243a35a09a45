//! Storage module for persisting catalog records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Entry and bundle record persistence (replace-on-write)
//! - The bundle membership relation
//! - Key enumeration for the in-memory identity mirror

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::path::Path;

/// Opens (or creates) the record store at `path`
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Store ready for use
/// * `Err(StorageError)` - No usable storage location; fatal to a run
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}

/// One catalog entry as fetched at `fetched_at`
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub hash: String,
    pub url: String,
    pub external_id: i64,
    pub title: String,
    /// Price in currency units; the currency is implied by the catalog locale
    pub price: f64,
    /// Share of positive reviews, in [0, 1]
    pub rating_score: f64,
    pub rating_count: u64,
    /// Lower-cased, trimmed, in page order
    pub tags: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}

/// One bundle and the entries it contains
#[derive(Debug, Clone, PartialEq)]
pub struct BundleRecord {
    pub hash: String,
    pub url: String,
    pub external_id: i64,
    pub title: String,
    /// Bundle discount, in [0, 1]
    pub discount_fraction: f64,
    pub total_price: f64,
    pub tags: Vec<String>,
    /// Entry hashes; members need not be stored entries yet
    pub member_hashes: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl EntryRecord {
    /// Returns true while the record is younger than `window`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.fetched_at < window
    }
}

impl BundleRecord {
    /// Returns true while the record is younger than `window`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.fetched_at < window
    }
}
