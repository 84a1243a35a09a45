//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and the
//! associated error types.

use crate::storage::{BundleRecord, EntryRecord};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record {hash} cannot store {field} = {value}")]
    Unrepresentable {
        hash: String,
        field: &'static str,
        value: u64,
    },

    #[error("Stored record {hash} is unreadable: {reason}")]
    Corrupt { hash: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable store of entry and bundle records keyed by identity hash
///
/// Writes replace whole records; nothing is ever merged or deleted.
pub trait RecordStore {
    // ===== Entries =====

    /// Inserts or replaces the entry stored under `record.hash`
    fn upsert_entry(&mut self, record: &EntryRecord) -> StorageResult<()>;

    /// Looks up an entry
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The stored entry
    /// * `Ok(None)` - No entry under `hash`
    /// * `Err(StorageError::Corrupt)` - A row exists but cannot be decoded
    fn get_entry(&self, hash: &str) -> StorageResult<Option<EntryRecord>>;

    /// Every stored entry hash
    fn all_entry_hashes(&self) -> StorageResult<HashSet<String>>;

    // ===== Bundles =====

    /// Inserts or replaces a bundle and links it to each member entry
    ///
    /// Membership rows that already exist are left alone.
    fn upsert_bundle(&mut self, record: &BundleRecord) -> StorageResult<()>;

    /// Looks up a bundle; same contract as [`get_entry`](Self::get_entry)
    fn get_bundle(&self, hash: &str) -> StorageResult<Option<BundleRecord>>;

    /// Every stored bundle hash
    fn all_bundle_hashes(&self) -> StorageResult<HashSet<String>>;

    /// Hashes of bundles that list `entry_hash` as a member, oldest link first
    fn bundles_containing(&self, entry_hash: &str) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    fn count_entries(&self) -> StorageResult<u64>;

    fn count_bundles(&self) -> StorageResult<u64>;

    fn count_memberships(&self) -> StorageResult<u64>;

    /// Counts entries fetched before `cutoff`
    fn count_entries_fetched_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64>;

    // ===== Lifecycle =====

    /// Releases the underlying handle
    ///
    /// Consuming `self` means a store is closed at most once; dropping a store
    /// without calling this also releases the handle.
    fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}
