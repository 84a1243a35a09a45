//! Statistics over the record store
//!
//! This module backs the `--stats` command.

use crate::storage::{RecordStore, StorageResult};
use chrono::{DateTime, Duration, Utc};

/// Store statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStatistics {
    /// Number of stored entries
    pub total_entries: u64,

    /// Number of stored bundles
    pub total_bundles: u64,

    /// Number of entry <-> bundle links
    pub total_memberships: u64,

    /// Entries older than the staleness window
    pub stale_entries: u64,

    /// Staleness window the stale count was taken against
    pub staleness_days: u32,
}

impl CatalogStatistics {
    /// Share of entries still inside the staleness window, as a percentage
    pub fn fresh_percentage(&self) -> f64 {
        if self.total_entries == 0 {
            return 0.0;
        }
        let fresh = self.total_entries.saturating_sub(self.stale_entries);
        (fresh as f64 / self.total_entries as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
/// * `staleness_days` - Window after which an entry counts as stale
/// * `now` - Reference time for the window
///
/// # Returns
///
/// * `Ok(CatalogStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics<S: RecordStore>(
    store: &S,
    staleness_days: u32,
    now: DateTime<Utc>,
) -> StorageResult<CatalogStatistics> {
    let cutoff = now - Duration::days(i64::from(staleness_days));

    Ok(CatalogStatistics {
        total_entries: store.count_entries()?,
        total_bundles: store.count_bundles()?,
        total_memberships: store.count_memberships()?,
        stale_entries: store.count_entries_fetched_before(cutoff)?,
        staleness_days,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CatalogStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Entries: {}", stats.total_entries);
    println!("  Bundles: {}", stats.total_bundles);
    println!("  Bundle memberships: {}", stats.total_memberships);
    println!();

    println!("Freshness ({} day window):", stats.staleness_days);
    println!(
        "  Stale entries: {} ({:.1}% fresh)",
        stats.stale_entries,
        stats.fresh_percentage()
    );
}
