//! Shared fixtures: a scripted extractor and a store that can be made to fail
#![allow(dead_code)]

use async_trait::async_trait;
use bundle_harvest::config::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig,
};
use bundle_harvest::extract::{BundleFields, BundlePage, EntryFields, ExtractionError, PageExtractor};
use bundle_harvest::storage::{
    BundleRecord, EntryRecord, RecordStore, SqliteStore, StorageError, StorageResult,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub const ORIGIN: &str = "https://store.steampowered.com";

pub fn app_url(id: u64) -> String {
    format!("{}/app/{}/?l=english", ORIGIN, id)
}

pub fn bundle_url(id: u64) -> String {
    format!("{}/bundle/{}/?l=english", ORIGIN, id)
}

pub fn bundle_list_url(id: u64) -> String {
    format!("{}/bundlelist/{}/?l=english", ORIGIN, id)
}

/// Fields of a complete, valid entry page
pub fn entry_fields(title: &str) -> EntryFields {
    EntryFields {
        title: Some(title.to_string()),
        price_text: Some("19,99€".to_string()),
        rating_text: Some("91% of the 12,345 user reviews for this game are positive.".to_string()),
        tags: vec!["Action".to_string(), "Indie".to_string()],
        release_date_text: Some("4 Apr, 2024".to_string()),
    }
}

pub fn bundle_page(title: &str, members: Vec<String>) -> BundlePage {
    BundlePage {
        fields: BundleFields {
            title: Some(title.to_string()),
            discount_text: Some("-20%".to_string()),
            price_text: Some("39,96€".to_string()),
            tags: vec![],
        },
        members,
    }
}

/// A stored entry for `url`, as if fetched at `fetched_at`
pub fn stored_entry(hash: &str, url: &str, fetched_at: DateTime<Utc>) -> EntryRecord {
    EntryRecord {
        hash: hash.to_string(),
        url: url.to_string(),
        external_id: 1,
        title: "Cached Game".to_string(),
        price: 9.99,
        rating_score: 0.75,
        rating_count: 100,
        tags: vec!["cached".to_string()],
        release_date: None,
        fetched_at,
    }
}

pub const ENTRY_PAGE: &str = r#"
    <html><body>
      <div class="apphub_AppName">Buckshot Roulette</div>
      <div class="game_area_purchase_game_wrapper">
        <div class="game_purchase_price price">2,99€</div>
      </div>
      <div class="user_reviews_summary_row" data-tooltip-html="96% of the 151,234 user reviews for this game are positive.">
        <span class="game_review_summary positive">Overwhelmingly Positive</span>
      </div>
      <div class="glance_tags popular_tags">
        <a class="app_tag" href="/tags/horror">Horror</a>
        <a class="app_tag" href="/tags/indie">Indie</a>
      </div>
      <div class="release_date">
        <div class="subtitle column">Release Date:</div>
        <div class="date">4 Apr, 2024</div>
      </div>
    </body></html>
"#;

pub const BUNDLE_PAGE: &str = r#"
    <html><body>
      <h2 class="pageheader">Abyssus Bundle</h2>
      <div class="discount_block">
        <div class="discount_pct">-15%</div>
        <div class="discount_final_price">24,47€</div>
      </div>
      <div class="tab_item"><a class="tab_item_overlay" href="/app/1721110/Abyssus/"></a></div>
      <div class="tab_item"><a class="tab_item_overlay" href="/app/2202980/Abyssus_Soundtrack/"></a></div>
    </body></html>
"#;

pub const BUNDLE_LIST_PAGE: &str = r#"
    <html><body>
      <a href="/bundle/28273/Abyssus_Bundle/">Abyssus Bundle</a>
      <a href="/bundle/28273/Abyssus_Bundle/">Abyssus Bundle</a>
    </body></html>
"#;

/// Run configuration pointing at a mock server, with no pacing
pub fn test_config(origin: &str, database_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            min_delay_ms: 0,
            max_delay_ms: 0,
            request_timeout_secs: 1,
            https_only: false,
            ..Default::default()
        },
        catalog: CatalogConfig {
            base_origin: origin.to_string(),
            language: "english".to_string(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: database_path.to_string(),
        },
        targets: vec![],
    }
}

#[derive(Default)]
struct FakeState {
    entries: HashMap<String, Result<EntryFields, ExtractionError>>,
    bundles: HashMap<String, Result<BundlePage, ExtractionError>>,
    lists: HashMap<String, Result<Vec<String>, ExtractionError>>,
    calls: Vec<String>,
    shutdown_on_call: Option<watch::Sender<bool>>,
}

/// Extractor answering from scripted pages and recording every call
///
/// Clones share state, so a test can keep one clone to inspect calls after
/// handing the other to the orchestrator. Unscripted URLs answer HTTP 404.
#[derive(Clone, Default)]
pub struct FakeExtractor {
    state: Arc<Mutex<FakeState>>,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, url: &str, fields: EntryFields) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(url.to_string(), Ok(fields));
        self
    }

    pub fn with_entry_error(self, url: &str, error: ExtractionError) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(url.to_string(), Err(error));
        self
    }

    pub fn with_bundle(self, url: &str, page: BundlePage) -> Self {
        self.state
            .lock()
            .unwrap()
            .bundles
            .insert(url.to_string(), Ok(page));
        self
    }

    pub fn with_bundle_list(self, url: &str, bundles: Vec<String>) -> Self {
        self.state
            .lock()
            .unwrap()
            .lists
            .insert(url.to_string(), Ok(bundles));
        self
    }

    /// Signals shutdown as soon as any page is requested
    pub fn with_shutdown_on_call(self, sender: watch::Sender<bool>) -> Self {
        self.state.lock().unwrap().shutdown_on_call = Some(sender);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == url).count()
    }

    fn record_call(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(url.to_string());
        if let Some(sender) = &state.shutdown_on_call {
            let _ = sender.send(true);
        }
    }

    fn not_found(url: &str) -> ExtractionError {
        ExtractionError::Status {
            url: url.to_string(),
            status: 404,
        }
    }

    fn bundle_lookup(&self, url: &str) -> Result<BundlePage, ExtractionError> {
        self.state
            .lock()
            .unwrap()
            .bundles
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found(url)))
    }
}

#[async_trait]
impl PageExtractor for FakeExtractor {
    async fn extract_entry(&self, url: &str) -> Result<EntryFields, ExtractionError> {
        self.record_call(url);
        self.state
            .lock()
            .unwrap()
            .entries
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found(url)))
    }

    async fn extract_bundle(&self, url: &str) -> Result<BundleFields, ExtractionError> {
        self.record_call(url);
        self.bundle_lookup(url).map(|page| page.fields)
    }

    async fn extract_bundle_members(&self, url: &str) -> Result<Vec<String>, ExtractionError> {
        self.record_call(url);
        self.bundle_lookup(url).map(|page| page.members)
    }

    async fn extract_bundle_page(&self, url: &str) -> Result<BundlePage, ExtractionError> {
        self.record_call(url);
        self.bundle_lookup(url)
    }

    async fn extract_bundle_list(&self, url: &str) -> Result<Vec<String>, ExtractionError> {
        self.record_call(url);
        self.state
            .lock()
            .unwrap()
            .lists
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found(url)))
    }
}

/// In-memory store whose writes or reads can be switched to fail
pub struct FaultyStore {
    inner: SqliteStore,
    pub fail_writes: bool,
    pub corrupt_reads: bool,
}

impl FaultyStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_writes: false,
            corrupt_reads: false,
        }
    }

    fn write_error() -> StorageError {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ))
    }

    fn corrupt(hash: &str) -> StorageError {
        StorageError::Corrupt {
            hash: hash.to_string(),
            reason: "tags: expected value".to_string(),
        }
    }
}

impl RecordStore for FaultyStore {
    fn upsert_entry(&mut self, record: &EntryRecord) -> StorageResult<()> {
        if self.fail_writes {
            return Err(Self::write_error());
        }
        self.inner.upsert_entry(record)
    }

    fn get_entry(&self, hash: &str) -> StorageResult<Option<EntryRecord>> {
        if self.corrupt_reads {
            return Err(Self::corrupt(hash));
        }
        self.inner.get_entry(hash)
    }

    fn all_entry_hashes(&self) -> StorageResult<HashSet<String>> {
        self.inner.all_entry_hashes()
    }

    fn upsert_bundle(&mut self, record: &BundleRecord) -> StorageResult<()> {
        if self.fail_writes {
            return Err(Self::write_error());
        }
        self.inner.upsert_bundle(record)
    }

    fn get_bundle(&self, hash: &str) -> StorageResult<Option<BundleRecord>> {
        if self.corrupt_reads {
            return Err(Self::corrupt(hash));
        }
        self.inner.get_bundle(hash)
    }

    fn all_bundle_hashes(&self) -> StorageResult<HashSet<String>> {
        self.inner.all_bundle_hashes()
    }

    fn bundles_containing(&self, entry_hash: &str) -> StorageResult<Vec<String>> {
        self.inner.bundles_containing(entry_hash)
    }

    fn count_entries(&self) -> StorageResult<u64> {
        self.inner.count_entries()
    }

    fn count_bundles(&self) -> StorageResult<u64> {
        self.inner.count_bundles()
    }

    fn count_memberships(&self) -> StorageResult<u64> {
        self.inner.count_memberships()
    }

    fn count_entries_fetched_before(&self, cutoff: DateTime<Utc>) -> StorageResult<u64> {
        self.inner.count_entries_fetched_before(cutoff)
    }

    fn close(self) -> StorageResult<()> {
        self.inner.close()
    }
}
