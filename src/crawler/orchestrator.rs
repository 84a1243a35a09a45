//! Crawl orchestrator - per-target decision logic
//!
//! This module drives each target through
//! `RESOLVE -> CACHE_CHECK -> {CACHE_HIT | FETCH -> PERSIST}`:
//! - Resolving references into canonical identities
//! - Serving known, fresh records straight from the store
//! - Fetching, validating and persisting everything else
//! - Pacing live fetches and stopping cleanly on shutdown

use crate::config::Config;
use crate::crawler::pacing::PolitenessDelay;
use crate::crawler::records::{build_bundle, build_entry};
use crate::extract::{HttpPageExtractor, PageExtractor};
use crate::identity::{IdentityResolver, ResolvedTarget, TargetKind, TargetRef};
use crate::state::{CatalogRecord, CrawlOutcome, KnownIdentitySet, TargetStage};
use crate::storage::{open_store, RecordStore, SqliteStore, StorageResult};
use crate::CrawlError;
use chrono::{Duration, Utc};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tokio::sync::watch;

/// Result of processing one target
#[derive(Debug)]
pub struct TargetReport {
    /// The target as supplied
    pub target: TargetRef,
    /// Identity hash, if the target resolved
    pub hash: Option<String>,
    pub outcome: CrawlOutcome,
    /// Targets a bundle list expanded into, in page order
    pub discovered: Vec<TargetRef>,
}

/// Result of processing a batch of targets
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One report per processed target, in processing order
    pub reports: Vec<TargetReport>,
    /// Politeness delays started during the batch
    pub delays_applied: usize,
    /// True if shutdown stopped the batch before every target ran
    pub interrupted: bool,
}

impl BatchReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &CrawlOutcome> {
        self.reports.iter().map(|report| &report.outcome)
    }

    pub fn cache_hits(&self) -> usize {
        self.outcomes().filter(|o| o.is_cache_hit()).count()
    }

    pub fn freshly_scraped(&self) -> usize {
        self.outcomes().filter(|o| o.is_fresh()).count()
    }

    pub fn expanded(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, CrawlOutcome::Expanded { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes().filter(|o| o.is_failure()).count()
    }
}

/// What the store holds for a resolved target, without fetching anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Not a known hash
    Missing,
    /// Known and usable as a cache hit
    Fresh,
    /// Known but older than the staleness window (only reported when refreshing)
    Stale,
    /// Known but unreadable or stored under another URL
    Unusable,
    /// Bundle lists are never cached
    Uncached,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Unusable => "unusable",
            Self::Uncached => "uncached",
        }
    }
}

/// Per-target crawl state machine over a record store and a page extractor
///
/// The orchestrator owns the store and the known-identity mirror for the
/// whole run; targets are processed strictly one at a time.
pub struct CrawlOrchestrator<S: RecordStore, E: PageExtractor> {
    store: S,
    known: KnownIdentitySet,
    extractor: E,
    resolver: IdentityResolver,
    pacing: PolitenessDelay,
    refresh_stale: bool,
    staleness: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<S: RecordStore, E: PageExtractor> CrawlOrchestrator<S, E> {
    /// Creates an orchestrator, loading the known identities from `store`
    ///
    /// Pacing and staleness start at their configuration defaults
    /// (2-5 seconds, 30 days, no refresh).
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to process targets
    /// * `Err(StorageError)` - The store could not list its hashes
    pub fn new(store: S, extractor: E, resolver: IdentityResolver) -> StorageResult<Self> {
        let known = KnownIdentitySet::load(&store)?;

        Ok(Self {
            store,
            known,
            extractor,
            resolver,
            pacing: PolitenessDelay::default(),
            refresh_stale: false,
            staleness: Duration::days(30),
            shutdown: None,
        })
    }

    /// Creates an orchestrator with pacing, staleness and catalog settings from `config`
    pub fn from_config(config: &Config, store: S, extractor: E) -> StorageResult<Self> {
        let orchestrator = Self::new(store, extractor, IdentityResolver::from_config(&config.catalog))?
            .with_pacing(PolitenessDelay::from_config(&config.crawler))
            .with_staleness_days(config.crawler.staleness_days)
            .with_refresh_stale(config.crawler.refresh_stale);
        Ok(orchestrator)
    }

    pub fn with_pacing(mut self, pacing: PolitenessDelay) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_staleness_days(mut self, days: u32) -> Self {
        self.staleness = Duration::days(i64::from(days));
        self
    }

    /// Treat cached records older than the staleness window as misses
    pub fn with_refresh_stale(mut self, refresh_stale: bool) -> Self {
        self.refresh_stale = refresh_stale;
        self
    }

    /// Observes `shutdown`; once it reads `true` no further target starts
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn known(&self) -> &KnownIdentitySet {
        &self.known
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Releases the store
    pub fn close(self) -> StorageResult<()> {
        self.store.close()
    }

    /// Gives the store back without closing it
    pub fn into_store(self) -> S {
        self.store
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    /// Whether a stored record may be served, given whether it is still fresh
    fn serves_cached(&self, fresh: bool) -> bool {
        !self.refresh_stale || fresh
    }

    /// Processes targets in order, one at a time
    ///
    /// A target's failure never stops the batch. A politeness delay follows
    /// every target that went to the network; cache hits and unresolvable
    /// targets are not delayed. Bundles discovered through a bundle list run
    /// right after that list, before the remaining input.
    pub async fn process_targets(&mut self, targets: &[TargetRef]) -> BatchReport {
        let mut queue: VecDeque<TargetRef> = targets.iter().cloned().collect();
        let mut batch = BatchReport::default();

        tracing::info!("Processing {} targets", queue.len());

        while let Some(target) = queue.pop_front() {
            if self.shutdown_requested() {
                batch.interrupted = true;
                queue.push_front(target);
                break;
            }

            let report = self.process_target(&target).await;

            for discovered in report.discovered.iter().rev() {
                queue.push_front(discovered.clone());
            }

            let needs_delay = report.outcome.applies_delay();
            batch.reports.push(report);

            if needs_delay {
                batch.delays_applied += 1;
                let pacing = self.pacing;
                if !pacing.wait(self.shutdown.as_mut()).await {
                    batch.interrupted = !queue.is_empty();
                    break;
                }
            }
        }

        if batch.interrupted {
            tracing::warn!(
                "Shutdown requested, {} targets not started",
                queue.len()
            );
        }

        tracing::info!(
            "Batch finished: {} cached, {} scraped, {} expanded, {} failed",
            batch.cache_hits(),
            batch.freshly_scraped(),
            batch.expanded(),
            batch.failures()
        );

        batch
    }

    /// Runs a single target through the state machine
    ///
    /// Applies no politeness delay; that is the batch's job.
    pub async fn process_target(&mut self, target: &TargetRef) -> TargetReport {
        log_stage(target, TargetStage::Resolve);

        let resolved = match self.resolver.resolve(target) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!("Cannot resolve {}: {}", target, e);
                return TargetReport {
                    target: target.clone(),
                    hash: None,
                    outcome: CrawlOutcome::Failed(e.into()),
                    discovered: Vec::new(),
                };
            }
        };

        let (outcome, discovered) = match resolved.kind {
            TargetKind::Entry => (self.process_entry(target, &resolved).await, Vec::new()),
            TargetKind::Bundle => (self.process_bundle(target, &resolved).await, Vec::new()),
            TargetKind::BundleList => self.process_bundle_list(target, &resolved).await,
        };

        log_stage(target, TargetStage::Done);
        match &outcome {
            CrawlOutcome::Failed(e) => {
                tracing::warn!("[{}] {} ({}): {}", outcome.label(), target, resolved.hash, e)
            }
            _ => tracing::info!("[{}] {} ({})", outcome.label(), target, resolved.hash),
        }

        TargetReport {
            target: target.clone(),
            hash: Some(resolved.hash),
            outcome,
            discovered,
        }
    }

    /// Reports what the store holds for `target` without fetching
    pub fn cache_status(&self, target: &ResolvedTarget) -> CacheStatus {
        let fetched = match target.kind {
            TargetKind::BundleList => return CacheStatus::Uncached,
            TargetKind::Entry if self.known.contains_entry(&target.hash) => self
                .store
                .get_entry(&target.hash)
                .map(|found| found.map(|r| {
                    let fresh = r.is_fresh(Utc::now(), self.staleness);
                    (r.url, fresh)
                })),
            TargetKind::Bundle if self.known.contains_bundle(&target.hash) => self
                .store
                .get_bundle(&target.hash)
                .map(|found| found.map(|r| {
                    let fresh = r.is_fresh(Utc::now(), self.staleness);
                    (r.url, fresh)
                })),
            _ => return CacheStatus::Missing,
        };

        match fetched {
            Ok(Some((url, _))) if url != target.url => CacheStatus::Unusable,
            Ok(Some((_, fresh))) if self.serves_cached(fresh) => CacheStatus::Fresh,
            Ok(Some(_)) => CacheStatus::Stale,
            Ok(None) | Err(_) => CacheStatus::Unusable,
        }
    }

    async fn process_entry(&mut self, target: &TargetRef, resolved: &ResolvedTarget) -> CrawlOutcome {
        log_stage(target, TargetStage::CacheCheck);

        if self.known.contains_entry(&resolved.hash) {
            match self.store.get_entry(&resolved.hash) {
                Ok(Some(record)) => {
                    if record.url != resolved.url {
                        return collision(resolved, record.url);
                    }
                    if self.serves_cached(record.is_fresh(Utc::now(), self.staleness)) {
                        return CrawlOutcome::CacheHit(CatalogRecord::Entry(record));
                    }
                    tracing::info!("Cached entry {} is stale, refreshing", resolved.hash);
                }
                Ok(None) => {
                    tracing::warn!("Known entry {} is missing from the store", resolved.hash)
                }
                Err(e) => tracing::warn!("Cached entry {} is unreadable: {}", resolved.hash, e),
            }
        }

        log_stage(target, TargetStage::Fetch);
        let fields = match self.extractor.extract_entry(&resolved.url).await {
            Ok(fields) => fields,
            Err(e) => return CrawlOutcome::Failed(e.into()),
        };

        let record = match build_entry(resolved, fields, Utc::now()) {
            Ok(record) => record,
            Err(e) => return CrawlOutcome::Failed(e),
        };

        log_stage(target, TargetStage::Persist);
        if let Err(e) = self.store.upsert_entry(&record) {
            return CrawlOutcome::Failed(CrawlError::Persistence(e));
        }
        self.known.mark_entry_known(&record.hash);

        CrawlOutcome::FreshlyScraped(CatalogRecord::Entry(record))
    }

    async fn process_bundle(&mut self, target: &TargetRef, resolved: &ResolvedTarget) -> CrawlOutcome {
        log_stage(target, TargetStage::CacheCheck);

        if self.known.contains_bundle(&resolved.hash) {
            match self.store.get_bundle(&resolved.hash) {
                Ok(Some(record)) => {
                    if record.url != resolved.url {
                        return collision(resolved, record.url);
                    }
                    if self.serves_cached(record.is_fresh(Utc::now(), self.staleness)) {
                        return CrawlOutcome::CacheHit(CatalogRecord::Bundle(record));
                    }
                    tracing::info!("Cached bundle {} is stale, refreshing", resolved.hash);
                }
                Ok(None) => {
                    tracing::warn!("Known bundle {} is missing from the store", resolved.hash)
                }
                Err(e) => tracing::warn!("Cached bundle {} is unreadable: {}", resolved.hash, e),
            }
        }

        log_stage(target, TargetStage::Fetch);
        let page = match self.extractor.extract_bundle_page(&resolved.url).await {
            Ok(page) => page,
            Err(e) => return CrawlOutcome::Failed(e.into()),
        };

        let member_hashes = self.resolve_members(resolved, &page.members);
        let record = match build_bundle(resolved, page.fields, member_hashes, Utc::now()) {
            Ok(record) => record,
            Err(e) => return CrawlOutcome::Failed(e),
        };

        log_stage(target, TargetStage::Persist);
        if let Err(e) = self.store.upsert_bundle(&record) {
            return CrawlOutcome::Failed(CrawlError::Persistence(e));
        }
        self.known.mark_bundle_known(&record.hash);

        CrawlOutcome::FreshlyScraped(CatalogRecord::Bundle(record))
    }

    /// Expands a bundle list into bundle targets; lists are always fetched live
    async fn process_bundle_list(
        &mut self,
        target: &TargetRef,
        resolved: &ResolvedTarget,
    ) -> (CrawlOutcome, Vec<TargetRef>) {
        log_stage(target, TargetStage::Fetch);

        let urls = match self.extractor.extract_bundle_list(&resolved.url).await {
            Ok(urls) => urls,
            Err(e) => return (CrawlOutcome::Failed(e.into()), Vec::new()),
        };

        let mut seen = HashSet::new();
        let mut discovered = Vec::new();
        for url in urls {
            let bundle = TargetRef::bundle(&url);
            match self.resolver.resolve(&bundle) {
                Ok(found) if seen.insert(found.hash.clone()) => discovered.push(bundle),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping bundle link {} on {}: {}", url, resolved.url, e),
            }
        }

        tracing::debug!(
            "Bundle list {} expanded into {} bundles",
            resolved.url,
            discovered.len()
        );

        (
            CrawlOutcome::Expanded {
                bundles: discovered.len(),
            },
            discovered,
        )
    }

    /// Member URLs to entry hashes, page order, first occurrence kept
    fn resolve_members(&self, bundle: &ResolvedTarget, member_urls: &[String]) -> Vec<String> {
        let mut member_hashes: Vec<String> = Vec::with_capacity(member_urls.len());

        for url in member_urls {
            match self.resolver.resolve(&TargetRef::entry(url)) {
                Ok(member) => {
                    if !member_hashes.contains(&member.hash) {
                        member_hashes.push(member.hash);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping member {} of bundle {}: {}", url, bundle.hash, e)
                }
            }
        }

        member_hashes
    }
}

impl CrawlOrchestrator<SqliteStore, HttpPageExtractor> {
    /// Opens the configured database and HTTP session for a live run
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to process targets
    /// * `Err(HarvestError)` - The store or the HTTP client is unusable; fatal to the run
    pub fn open(config: &Config) -> crate::Result<Self> {
        let store = open_store(Path::new(&config.output.database_path))?;
        let extractor = HttpPageExtractor::from_config(config)?;
        Ok(Self::from_config(config, store, extractor)?)
    }
}

fn collision(resolved: &ResolvedTarget, stored_url: String) -> CrawlOutcome {
    tracing::error!(
        "Hash {} already belongs to {}, refusing to serve or overwrite it for {}",
        resolved.hash,
        stored_url,
        resolved.url
    );
    CrawlOutcome::Failed(CrawlError::HashCollision {
        hash: resolved.hash.clone(),
        stored_url,
        requested_url: resolved.url.clone(),
    })
}

fn log_stage(target: &TargetRef, stage: TargetStage) {
    tracing::debug!("{} -> {}", target, stage);
}
