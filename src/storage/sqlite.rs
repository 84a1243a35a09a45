//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::{BundleRecord, EntryRecord};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite record store
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// The parent directory is created if missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to create the directory or open the database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        tracing::debug!("Opened record store at {}", path.display());
        Ok(Self { conn })
    }

    /// Creates an in-memory database (tests and dry runs)
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn hash_set(&self, sql: &str) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let hashes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(hashes)
    }

    fn write_entry(&mut self, record: &EntryRecord) -> StorageResult<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let rating_count =
            i64::try_from(record.rating_count).map_err(|_| StorageError::Unrepresentable {
                hash: record.hash.clone(),
                field: "rating_count",
                value: record.rating_count,
            })?;

        self.conn.execute(
            "INSERT OR REPLACE INTO entries
             (hash, url, external_id, title, price, rating_score, rating_count, tags, release_date, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.hash,
                record.url,
                record.external_id,
                record.title,
                record.price,
                record.rating_score,
                rating_count,
                tags,
                record
                    .release_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                encode_timestamp(record.fetched_at),
            ],
        )?;
        Ok(())
    }

    fn write_bundle(&mut self, record: &BundleRecord) -> StorageResult<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let members = serde_json::to_string(&record.member_hashes)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO bundles
             (hash, url, external_id, title, discount_fraction, total_price, tags, member_hashes, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.hash,
                record.url,
                record.external_id,
                record.title,
                record.discount_fraction,
                record.total_price,
                tags,
                members,
                encode_timestamp(record.fetched_at),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO bundle_members (entry_hash, bundle_hash) VALUES (?1, ?2)",
            )?;
            for member in &record.member_hashes {
                stmt.execute(params![member, record.hash])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Raw `entries` row, decoded outside the rusqlite row closure
struct EntryRow {
    hash: String,
    url: String,
    external_id: i64,
    title: String,
    price: f64,
    rating_score: f64,
    rating_count: i64,
    tags: String,
    release_date: Option<String>,
    fetched_at: String,
}

/// Raw `bundles` row
struct BundleRow {
    hash: String,
    url: String,
    external_id: i64,
    title: String,
    discount_fraction: f64,
    total_price: f64,
    tags: String,
    member_hashes: String,
    fetched_at: String,
}

impl EntryRow {
    fn decode(self) -> StorageResult<EntryRecord> {
        let corrupt = |reason: String| StorageError::Corrupt {
            hash: self.hash.clone(),
            reason,
        };

        let tags: Vec<String> =
            serde_json::from_str(&self.tags).map_err(|e| corrupt(format!("tags: {}", e)))?;
        let rating_count = u64::try_from(self.rating_count)
            .map_err(|_| corrupt(format!("negative rating_count {}", self.rating_count)))?;
        let release_date = match &self.release_date {
            Some(text) => Some(
                NaiveDate::parse_from_str(text, DATE_FORMAT)
                    .map_err(|e| corrupt(format!("release_date '{}': {}", text, e)))?,
            ),
            None => None,
        };
        let fetched_at =
            decode_timestamp(&self.fetched_at).map_err(|e| corrupt(format!("fetched_at: {}", e)))?;

        Ok(EntryRecord {
            hash: self.hash,
            url: self.url,
            external_id: self.external_id,
            title: self.title,
            price: self.price,
            rating_score: self.rating_score,
            rating_count,
            tags,
            release_date,
            fetched_at,
        })
    }
}

impl BundleRow {
    fn decode(self) -> StorageResult<BundleRecord> {
        let corrupt = |reason: String| StorageError::Corrupt {
            hash: self.hash.clone(),
            reason,
        };

        let tags: Vec<String> =
            serde_json::from_str(&self.tags).map_err(|e| corrupt(format!("tags: {}", e)))?;
        let member_hashes: Vec<String> = serde_json::from_str(&self.member_hashes)
            .map_err(|e| corrupt(format!("member_hashes: {}", e)))?;
        let fetched_at =
            decode_timestamp(&self.fetched_at).map_err(|e| corrupt(format!("fetched_at: {}", e)))?;

        Ok(BundleRecord {
            hash: self.hash,
            url: self.url,
            external_id: self.external_id,
            title: self.title,
            discount_fraction: self.discount_fraction,
            total_price: self.total_price,
            tags,
            member_hashes,
            fetched_at,
        })
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort as text
fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|at| at.with_timezone(&Utc))
}

impl RecordStore for SqliteStore {
    // ===== Entries =====

    fn upsert_entry(&mut self, record: &EntryRecord) -> StorageResult<()> {
        let result = self.write_entry(record);
        if let Err(e) = &result {
            tracing::error!("Failed to store entry {} ({}): {}", record.hash, record.url, e);
        }
        result
    }

    fn get_entry(&self, hash: &str) -> StorageResult<Option<EntryRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT hash, url, external_id, title, price, rating_score, rating_count,
                 tags, release_date, fetched_at
                 FROM entries WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok(EntryRow {
                        hash: row.get(0)?,
                        url: row.get(1)?,
                        external_id: row.get(2)?,
                        title: row.get(3)?,
                        price: row.get(4)?,
                        rating_score: row.get(5)?,
                        rating_count: row.get(6)?,
                        tags: row.get(7)?,
                        release_date: row.get(8)?,
                        fetched_at: row.get(9)?,
                    })
                },
            )
            .optional()?;

        row.map(EntryRow::decode).transpose()
    }

    fn all_entry_hashes(&self) -> StorageResult<HashSet<String>> {
        self.hash_set("SELECT hash FROM entries")
    }

    // ===== Bundles =====

    fn upsert_bundle(&mut self, record: &BundleRecord) -> StorageResult<()> {
        let result = self.write_bundle(record);
        if let Err(e) = &result {
            tracing::error!("Failed to store bundle {} ({}): {}", record.hash, record.url, e);
        }
        result
    }

    fn get_bundle(&self, hash: &str) -> StorageResult<Option<BundleRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT hash, url, external_id, title, discount_fraction, total_price,
                 tags, member_hashes, fetched_at
                 FROM bundles WHERE hash = ?1",
                params![hash],
                |row| {
                    Ok(BundleRow {
                        hash: row.get(0)?,
                        url: row.get(1)?,
                        external_id: row.get(2)?,
                        title: row.get(3)?,
                        discount_fraction: row.get(4)?,
                        total_price: row.get(5)?,
                        tags: row.get(6)?,
                        member_hashes: row.get(7)?,
                        fetched_at: row.get(8)?,
                    })
                },
            )
            .optional()?;

        row.map(BundleRow::decode).transpose()
    }

    fn all_bundle_hashes(&self) -> StorageResult<HashSet<String>> {
        self.hash_set("SELECT hash FROM bundles")
    }

    fn bundles_containing(&self, entry_hash: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT bundle_hash FROM bundle_members WHERE entry_hash = ?1 ORDER BY rowid",
        )?;

        let bundles = stmt
            .query_map(params![entry_hash], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(bundles)
    }

    // ===== Statistics =====

    fn count_entries(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM entries")
    }

    fn count_bundles(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM bundles")
    }

    fn count_memberships(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM bundle_members")
    }

    fn count_entries_fetched_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE fetched_at < ?1",
            params![encode_timestamp(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    // ===== Lifecycle =====

    fn close(self) -> StorageResult<()> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        tracing::info!("Database connection closed");
        Ok(())
    }
}
