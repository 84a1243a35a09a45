use crate::storage::{RecordStore, StorageResult};
use std::collections::HashSet;

/// In-memory mirror of the hashes held by a [`RecordStore`]
///
/// Loaded once when a crawl starts and updated right after every successful
/// write, so a membership test never needs a database round trip.
#[derive(Debug, Clone, Default)]
pub struct KnownIdentitySet {
    entries: HashSet<String>,
    bundles: HashSet<String>,
}

impl KnownIdentitySet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every entry and bundle hash from `store`
    ///
    /// # Returns
    ///
    /// * `Ok(KnownIdentitySet)` - Set mirroring the store
    /// * `Err(StorageError)` - The store could not enumerate its keys
    pub fn load<S: RecordStore>(store: &S) -> StorageResult<Self> {
        let entries = store.all_entry_hashes()?;
        let bundles = store.all_bundle_hashes()?;

        tracing::debug!(
            "Loaded {} known entries and {} known bundles",
            entries.len(),
            bundles.len()
        );

        Ok(Self { entries, bundles })
    }

    pub fn contains_entry(&self, hash: &str) -> bool {
        self.entries.contains(hash)
    }

    pub fn contains_bundle(&self, hash: &str) -> bool {
        self.bundles.contains(hash)
    }

    /// Records an entry hash after its record was written
    ///
    /// Returns true if the hash was not already known.
    pub fn mark_entry_known(&mut self, hash: &str) -> bool {
        self.entries.insert(hash.to_string())
    }

    /// Records a bundle hash after its record was written
    pub fn mark_bundle_known(&mut self, hash: &str) -> bool {
        self.bundles.insert(hash.to_string())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }
}
