//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Bundle-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per catalog entry, keyed by identity hash
CREATE TABLE IF NOT EXISTS entries (
    hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    external_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    price REAL NOT NULL,
    rating_score REAL NOT NULL,
    rating_count INTEGER NOT NULL,
    tags TEXT NOT NULL,
    release_date TEXT,
    fetched_at TEXT NOT NULL
);

-- One row per bundle; member_hashes keeps the page order
CREATE TABLE IF NOT EXISTS bundles (
    hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    external_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    discount_fraction REAL NOT NULL,
    total_price REAL NOT NULL,
    tags TEXT NOT NULL,
    member_hashes TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);

-- Entry <-> bundle membership; entries may not be stored yet
CREATE TABLE IF NOT EXISTS bundle_members (
    entry_hash TEXT NOT NULL,
    bundle_hash TEXT NOT NULL,
    PRIMARY KEY (entry_hash, bundle_hash)
);

CREATE INDEX IF NOT EXISTS idx_bundle_members_bundle ON bundle_members(bundle_hash);
"#;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// Initializes the database schema
///
/// Safe to run against an already initialized database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &rusqlite::Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
