//! Orchestrator behaviour against a scripted extractor

use crate::common::{
    app_url, bundle_list_url, bundle_page, bundle_url, entry_fields, stored_entry, FakeExtractor,
    FaultyStore, ORIGIN,
};
use bundle_harvest::crawler::{CacheStatus, CrawlOrchestrator, PolitenessDelay};
use bundle_harvest::extract::ExtractionError;
use bundle_harvest::identity::{content_hash, IdentityResolver, TargetRef};
use bundle_harvest::state::CrawlOutcome;
use bundle_harvest::storage::{RecordStore, SqliteStore, StorageError};
use bundle_harvest::{CrawlError, IdentityError};
use chrono::{Duration, Utc};
use tokio::sync::watch;

fn orchestrator<S: RecordStore>(store: S, extractor: FakeExtractor) -> CrawlOrchestrator<S, FakeExtractor> {
    CrawlOrchestrator::new(store, extractor, IdentityResolver::new(ORIGIN, "english"))
        .unwrap()
        .with_pacing(PolitenessDelay::none())
}

#[tokio::test]
async fn test_fresh_then_cached_then_cached() {
    // B is already stored; A is new
    let mut store = SqliteStore::open_in_memory().unwrap();
    let b_url = app_url(20);
    store
        .upsert_entry(&stored_entry(&content_hash(&b_url), &b_url, Utc::now()))
        .unwrap();

    let extractor = FakeExtractor::new().with_entry(&app_url(10), entry_fields("Game A"));
    let spy = extractor.clone();
    let mut orchestrator = orchestrator(store, extractor);

    let batch = orchestrator
        .process_targets(&[
            TargetRef::entry("10"),
            TargetRef::entry("https://store.steampowered.com/app/20/Game_B/"),
            TargetRef::entry("https://example.test/app/10/Game_A"),
        ])
        .await;

    let outcomes: Vec<&str> = batch.outcomes().map(|o| o.label()).collect();
    assert_eq!(outcomes, vec!["freshly_scraped", "cache_hit", "cache_hit"]);

    // Only the first target reached the extractor
    assert_eq!(spy.calls(), vec![app_url(10)]);
    assert_eq!(batch.delays_applied, 1);
    assert!(!batch.interrupted);

    let hash_a = content_hash(&app_url(10));
    assert!(orchestrator.known().contains_entry(&hash_a));
    let stored = orchestrator.store().get_entry(&hash_a).unwrap().unwrap();
    assert_eq!(stored.title, "Game A");
    assert_eq!(stored.tags, vec!["action", "indie"]);
    assert_eq!(stored.rating_count, 12_345);
}

#[tokio::test]
async fn test_cache_hit_returns_stored_record() {
    let url = app_url(30);
    let hash = content_hash(&url);
    let record = stored_entry(&hash, &url, Utc::now());

    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_entry(&record).unwrap();

    let spy = FakeExtractor::new();
    let mut orchestrator = orchestrator(store, spy.clone());
    let report = orchestrator.process_target(&TargetRef::entry("30")).await;

    assert_eq!(report.hash.as_deref(), Some(hash.as_str()));
    match report.outcome {
        CrawlOutcome::CacheHit(cached) => assert_eq!(cached.as_entry(), Some(&record)),
        other => panic!("expected a cache hit, got {:?}", other),
    }
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn test_missing_release_date_persists_nothing() {
    let mut fields = entry_fields("No Date");
    fields.release_date_text = None;

    let extractor = FakeExtractor::new().with_entry(&app_url(40), fields);
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), extractor);

    let batch = orchestrator.process_targets(&[TargetRef::entry("40")]).await;

    assert!(matches!(
        batch.reports[0].outcome,
        CrawlOutcome::Failed(CrawlError::Extraction(ExtractionError::MissingField(
            "release_date"
        )))
    ));
    assert_eq!(orchestrator.store().count_entries().unwrap(), 0);
    assert_eq!(orchestrator.known().entry_count(), 0);
    // The fetch happened, so the delay is still paid
    assert_eq!(batch.delays_applied, 1);
}

#[tokio::test]
async fn test_extraction_failure_does_not_abort_batch() {
    let extractor = FakeExtractor::new()
        .with_entry_error(
            &app_url(50),
            ExtractionError::Timeout {
                url: app_url(50),
            },
        )
        .with_entry(&app_url(51), entry_fields("Survivor"));
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), extractor);

    let batch = orchestrator
        .process_targets(&[TargetRef::entry("50"), TargetRef::entry("51")])
        .await;

    assert_eq!(batch.failures(), 1);
    assert_eq!(batch.freshly_scraped(), 1);
    assert_eq!(batch.delays_applied, 2);
    assert!(!orchestrator.known().contains_entry(&content_hash(&app_url(50))));
}

#[tokio::test]
async fn test_delays_equal_targets_minus_cache_hits() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    for id in [61, 63] {
        let url = app_url(id);
        store
            .upsert_entry(&stored_entry(&content_hash(&url), &url, Utc::now()))
            .unwrap();
    }

    let mut extractor = FakeExtractor::new();
    for id in [60, 62, 64] {
        extractor = extractor.with_entry(&app_url(id), entry_fields("Game"));
    }
    let mut orchestrator = orchestrator(store, extractor);

    let targets: Vec<TargetRef> = (60..65).map(|id| TargetRef::entry(&id.to_string())).collect();
    let batch = orchestrator.process_targets(&targets).await;

    assert_eq!(batch.reports.len(), 5);
    assert_eq!(batch.cache_hits(), 2);
    assert_eq!(batch.delays_applied, 5 - 2);
}

#[tokio::test]
async fn test_unresolvable_targets_are_not_delayed() {
    let spy = FakeExtractor::new();
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), spy.clone());

    let batch = orchestrator
        .process_targets(&[
            TargetRef::new("dlc", "440"),
            TargetRef::entry(""),
            TargetRef::entry("not-an-id"),
        ])
        .await;

    assert_eq!(batch.failures(), 3);
    assert_eq!(batch.delays_applied, 0);
    assert!(spy.calls().is_empty());
    assert!(batch.reports.iter().all(|r| r.hash.is_none()));
    assert!(matches!(
        batch.reports[0].outcome,
        CrawlOutcome::Failed(CrawlError::Identity(IdentityError::UnknownKind(_)))
    ));
}

#[tokio::test]
async fn test_persistence_failure_keeps_target_unknown() {
    let mut store = FaultyStore::new(SqliteStore::open_in_memory().unwrap());
    store.fail_writes = true;

    let spy = FakeExtractor::new().with_entry(&app_url(70), entry_fields("Unlucky"));
    let mut first_run = orchestrator(store, spy.clone());

    let batch = first_run.process_targets(&[TargetRef::entry("70")]).await;
    assert!(matches!(
        batch.reports[0].outcome,
        CrawlOutcome::Failed(CrawlError::Persistence(StorageError::Io(_)))
    ));
    assert_eq!(batch.delays_applied, 1);
    assert!(!first_run.known().contains_entry(&content_hash(&app_url(70))));

    // Once writes work again the target is fetched again
    let mut store = first_run.into_store();
    store.fail_writes = false;
    let mut second_run = orchestrator(store, spy.clone());
    let batch = second_run.process_targets(&[TargetRef::entry("70")]).await;

    assert!(batch.reports[0].outcome.is_fresh());
    assert_eq!(spy.call_count(&app_url(70)), 2);
}

#[tokio::test]
async fn test_unreadable_cache_entry_is_refetched() {
    let url = app_url(80);
    let mut inner = SqliteStore::open_in_memory().unwrap();
    inner
        .upsert_entry(&stored_entry(&content_hash(&url), &url, Utc::now()))
        .unwrap();

    let mut store = FaultyStore::new(inner);
    store.corrupt_reads = true;

    let spy = FakeExtractor::new().with_entry(&url, entry_fields("Recovered"));
    let mut orchestrator = orchestrator(store, spy.clone());
    let report = orchestrator.process_target(&TargetRef::entry("80")).await;

    assert!(report.outcome.is_fresh());
    assert_eq!(spy.call_count(&url), 1);
}

#[tokio::test]
async fn test_stale_records_refresh_only_when_asked() {
    let url = app_url(90);
    let hash = content_hash(&url);
    let old = Utc::now() - Duration::days(40);

    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_entry(&stored_entry(&hash, &url, old)).unwrap();

    let spy = FakeExtractor::new().with_entry(&url, entry_fields("Refreshed"));

    // Default: staleness is ignored
    let mut lenient = orchestrator(store, spy.clone());
    let report = lenient.process_target(&TargetRef::entry("90")).await;
    assert!(report.outcome.is_cache_hit());
    assert!(spy.calls().is_empty());

    let mut strict = orchestrator(lenient.into_store(), spy.clone())
        .with_refresh_stale(true)
        .with_staleness_days(30);
    let resolved = strict.resolver().resolve(&TargetRef::entry("90")).unwrap();
    assert_eq!(strict.cache_status(&resolved), CacheStatus::Stale);

    let report = strict.process_target(&TargetRef::entry("90")).await;
    assert!(report.outcome.is_fresh());
    assert_eq!(spy.call_count(&url), 1);

    let refreshed = strict.store().get_entry(&hash).unwrap().unwrap();
    assert_eq!(refreshed.title, "Refreshed");
    assert!(refreshed.fetched_at > old);
    assert_eq!(strict.cache_status(&resolved), CacheStatus::Fresh);
}

#[tokio::test]
async fn test_hash_collision_is_reported_not_overwritten() {
    let url = app_url(100);
    let hash = content_hash(&url);
    let foreign = stored_entry(&hash, "https://store.steampowered.com/app/999/?l=english", Utc::now());

    let mut store = SqliteStore::open_in_memory().unwrap();
    store.upsert_entry(&foreign).unwrap();

    let spy = FakeExtractor::new().with_entry(&url, entry_fields("Intruder"));
    let mut orchestrator = orchestrator(store, spy.clone());
    let batch = orchestrator.process_targets(&[TargetRef::entry("100")]).await;

    match &batch.reports[0].outcome {
        CrawlOutcome::Failed(CrawlError::HashCollision {
            stored_url,
            requested_url,
            ..
        }) => {
            assert_eq!(stored_url, &foreign.url);
            assert_eq!(requested_url, &url);
        }
        other => panic!("expected a collision, got {:?}", other),
    }
    assert!(spy.calls().is_empty());
    assert_eq!(batch.delays_applied, 0);
    assert_eq!(orchestrator.store().get_entry(&hash).unwrap(), Some(foreign));
}

#[tokio::test]
async fn test_bundle_members_are_resolved_and_linked() {
    let members = vec![
        "https://store.steampowered.com/app/1/One/".to_string(),
        "https://store.steampowered.com/app/2/Two/".to_string(),
        "https://store.steampowered.com/app/1/One_Again/".to_string(),
        "https://store.steampowered.com/app/soundtrack/".to_string(),
    ];
    let spy = FakeExtractor::new().with_bundle(&bundle_url(500), bundle_page("Pack", members));
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), spy.clone());

    let report = orchestrator.process_target(&TargetRef::bundle("500")).await;
    let bundle = match report.outcome {
        CrawlOutcome::FreshlyScraped(record) => record.as_bundle().cloned().unwrap(),
        other => panic!("expected a fresh bundle, got {:?}", other),
    };

    let one = content_hash(&app_url(1));
    let two = content_hash(&app_url(2));
    assert_eq!(bundle.member_hashes, vec![one.clone(), two.clone()]);
    assert_eq!(bundle.discount_fraction, 0.2);
    assert_eq!(bundle.total_price, 39.96);
    // One fetch covers header and members
    assert_eq!(spy.calls(), vec![bundle_url(500)]);

    let store = orchestrator.store();
    assert_eq!(store.bundles_containing(&one).unwrap(), vec![bundle.hash.clone()]);
    assert_eq!(store.bundles_containing(&two).unwrap(), vec![bundle.hash.clone()]);
    assert!(orchestrator.known().contains_bundle(&bundle.hash));
    // Members are linked before they exist as entries
    assert_eq!(store.count_entries().unwrap(), 0);
}

#[tokio::test]
async fn test_bundle_without_members_fails() {
    let spy = FakeExtractor::new().with_bundle(&bundle_url(501), bundle_page("Empty", vec![]));
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), spy);

    let report = orchestrator.process_target(&TargetRef::bundle("501")).await;

    assert!(report.outcome.is_failure());
    assert_eq!(orchestrator.store().count_bundles().unwrap(), 0);
}

#[tokio::test]
async fn test_bundle_list_expands_before_remaining_targets() {
    let cached_bundle = bundle_url(601);
    let mut store = SqliteStore::open_in_memory().unwrap();
    store
        .upsert_bundle(&bundle_harvest::storage::BundleRecord {
            hash: content_hash(&cached_bundle),
            url: cached_bundle.clone(),
            external_id: 601,
            title: "Cached Pack".to_string(),
            discount_fraction: 0.1,
            total_price: 5.0,
            tags: vec![],
            member_hashes: vec![content_hash(&app_url(1))],
            fetched_at: Utc::now(),
        })
        .unwrap();

    let spy = FakeExtractor::new()
        .with_bundle_list(
            &bundle_list_url(600),
            vec![
                "https://store.steampowered.com/bundle/601/Cached_Pack/".to_string(),
                "https://store.steampowered.com/bundle/602/New_Pack/".to_string(),
                "https://store.steampowered.com/bundle/601/".to_string(),
            ],
        )
        .with_bundle(&bundle_url(602), bundle_page("New Pack", vec![app_url(3)]))
        .with_entry(&app_url(700), entry_fields("After"));
    let mut orchestrator = orchestrator(store, spy.clone());

    let batch = orchestrator
        .process_targets(&[TargetRef::bundle_list("600"), TargetRef::entry("700")])
        .await;

    let outcomes: Vec<&str> = batch.outcomes().map(|o| o.label()).collect();
    assert_eq!(
        outcomes,
        vec!["expanded", "cache_hit", "freshly_scraped", "freshly_scraped"]
    );
    assert!(matches!(
        batch.reports[0].outcome,
        CrawlOutcome::Expanded { bundles: 2 }
    ));
    assert_eq!(
        spy.calls(),
        vec![bundle_list_url(600), bundle_url(602), app_url(700)]
    );
    assert_eq!(batch.delays_applied, 3);
}

#[tokio::test]
async fn test_shutdown_before_start() {
    let (_tx, rx) = watch::channel(true);
    let spy = FakeExtractor::new().with_entry(&app_url(800), entry_fields("Never"));
    let mut orchestrator =
        orchestrator(SqliteStore::open_in_memory().unwrap(), spy.clone()).with_shutdown(rx);

    let batch = orchestrator.process_targets(&[TargetRef::entry("800")]).await;

    assert!(batch.interrupted);
    assert!(batch.reports.is_empty());
    assert!(spy.calls().is_empty());
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_target_finish() {
    let (tx, rx) = watch::channel(false);
    let spy = FakeExtractor::new()
        .with_entry(&app_url(810), entry_fields("In Flight"))
        .with_entry(&app_url(811), entry_fields("Not Started"))
        .with_shutdown_on_call(tx);
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), spy.clone())
        .with_pacing(PolitenessDelay::from_millis(60_000, 60_000))
        .with_shutdown(rx);

    let batch = orchestrator
        .process_targets(&[TargetRef::entry("810"), TargetRef::entry("811")])
        .await;

    assert!(batch.interrupted);
    assert_eq!(batch.reports.len(), 1);
    assert!(batch.reports[0].outcome.is_fresh());
    assert_eq!(spy.calls(), vec![app_url(810)]);
    assert!(orchestrator
        .known()
        .contains_entry(&content_hash(&app_url(810))));
}

#[tokio::test]
async fn test_shutdown_after_last_target_is_not_an_interruption() {
    let (tx, rx) = watch::channel(false);
    let spy = FakeExtractor::new()
        .with_entry(&app_url(820), entry_fields("Only Target"))
        .with_shutdown_on_call(tx);
    let mut orchestrator = orchestrator(SqliteStore::open_in_memory().unwrap(), spy.clone())
        .with_pacing(PolitenessDelay::from_millis(60_000, 60_000))
        .with_shutdown(rx);

    let batch = orchestrator.process_targets(&[TargetRef::entry("820")]).await;

    assert!(!batch.interrupted);
    assert_eq!(batch.reports.len(), 1);
    assert!(batch.reports[0].outcome.is_fresh());
    assert_eq!(batch.delays_applied, 1);
}
