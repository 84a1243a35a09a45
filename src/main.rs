//! Bundle-Harvest main entry point
//!
//! This is the command-line interface for the Bundle-Harvest catalog crawler.

use anyhow::{Context, Result};
use bundle_harvest::config::{load_config_with_hash, Config};
use bundle_harvest::crawler::CrawlOrchestrator;
use bundle_harvest::extract::HttpPageExtractor;
use bundle_harvest::identity::TargetRef;
use bundle_harvest::output::{exit_code, load_statistics, print_run_summary, print_statistics};
use bundle_harvest::storage::{open_store, RecordStore, SqliteStore};
use clap::Parser;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Bundle-Harvest: an incremental catalog crawler
///
/// Bundle-Harvest collects price, rating, tag and release-date records for
/// catalog entries and bundles. Every record is cached under a hash of its
/// canonical URL, so targets already in the database are never fetched again
/// unless they have gone stale and --refresh-stale is given.
///
/// Only one process may use a database at a time.
#[derive(Parser, Debug)]
#[command(name = "bundle-harvest")]
#[command(version)]
#[command(about = "An incremental catalog crawler")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Extra target, processed after the config file's targets (repeatable)
    #[arg(long = "target", value_name = "KIND=REFERENCE", value_parser = parse_target)]
    targets: Vec<TargetRef>,

    /// Re-fetch cached records older than the staleness window
    #[arg(long)]
    refresh_stale: bool,

    /// Delete the database before starting
    #[arg(long, conflicts_with = "stats")]
    fresh_db: bool,

    /// Resolve targets and show their cache status without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Parses `KIND=REFERENCE`; the kind itself is checked when the target runs
fn parse_target(s: &str) -> std::result::Result<TargetRef, String> {
    match s.split_once('=') {
        Some((kind, reference)) if !kind.trim().is_empty() => {
            Ok(TargetRef::new(kind.trim(), reference.trim()))
        }
        _ => Err(format!("expected KIND=REFERENCE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.refresh_stale {
        config.crawler.refresh_stale = true;
    }

    let mut targets = config.target_refs();
    targets.extend(cli.targets.iter().cloned());

    let database_path = PathBuf::from(&config.output.database_path);

    if cli.stats {
        return handle_stats(&config, &database_path);
    }

    if cli.fresh_db {
        remove_database(&database_path)?;
    }

    if cli.dry_run {
        return handle_dry_run(&config, &database_path, &targets);
    }

    let code = handle_crawl(&config, &database_path, &targets).await?;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bundle_harvest=info,warn"),
            1 => EnvFilter::new("bundle_harvest=debug,info"),
            2 => EnvFilter::new("bundle_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Deletes the database file and its WAL side files
fn remove_database(path: &Path) -> Result<()> {
    let mut side_files = Vec::new();
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        side_files.push(PathBuf::from(name));
    }

    for file in std::iter::once(path.to_path_buf()).chain(side_files) {
        if file.exists() {
            std::fs::remove_file(&file)
                .with_context(|| format!("Failed to delete {}", file.display()))?;
            tracing::info!("Deleted {}", file.display());
        }
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, database_path: &Path) -> Result<()> {
    println!("Database: {}\n", database_path.display());

    let store = open_store(database_path)
        .with_context(|| format!("Failed to open database {}", database_path.display()))?;

    let stats = load_statistics(&store, config.crawler.staleness_days, chrono::Utc::now())?;
    print_statistics(&stats);

    store.close()?;
    Ok(())
}

/// Handles the --dry-run mode: resolves targets and reports cache status
fn handle_dry_run(config: &Config, database_path: &Path, targets: &[TargetRef]) -> Result<()> {
    println!("=== Bundle-Harvest Dry Run ===\n");

    println!("Catalog: {} ({})", config.catalog.base_origin, config.catalog.language);
    println!(
        "Politeness delay: {}-{} ms",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms
    );
    println!(
        "Staleness window: {} days (refresh stale: {})",
        config.crawler.staleness_days, config.crawler.refresh_stale
    );
    println!("Database: {}\n", database_path.display());

    // A dry run never creates the database
    let store = if database_path.exists() {
        open_store(database_path)?
    } else {
        SqliteStore::open_in_memory()?
    };
    let extractor = HttpPageExtractor::from_config(config)?;
    let orchestrator = CrawlOrchestrator::from_config(config, store, extractor)?;

    println!("Targets ({}):", targets.len());
    for target in targets {
        match orchestrator.resolver().resolve(target) {
            Ok(resolved) => println!(
                "  {} -> {} [{}] {}",
                target,
                resolved.url,
                resolved.hash,
                orchestrator.cache_status(&resolved).as_str()
            ),
            Err(e) => println!("  {} -> error: {}", target, e),
        }
    }

    orchestrator.close()?;
    Ok(())
}

/// Relays interrupts: the first requests shutdown, the second aborts the process
async fn watch_interrupts(shutdown: watch::Sender<bool>) {
    let next_interrupt = || async { tokio::signal::ctrl_c().await.is_ok() };
    if relay_interrupts(next_interrupt, shutdown).await {
        tracing::error!("Second interrupt received, aborting");
        std::process::exit(130);
    }
}

/// Sends shutdown on the first interrupt; returns true once a second one arrives
///
/// `next_interrupt` resolves to false when the signal source fails.
async fn relay_interrupts<F, Fut>(mut next_interrupt: F, shutdown: watch::Sender<bool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !next_interrupt().await {
        return false;
    }
    tracing::warn!("Interrupt received, finishing the current target (Ctrl-C again to abort)");
    let _ = shutdown.send(true);

    next_interrupt().await
}

/// Handles the main crawl operation; returns the process exit code
async fn handle_crawl(config: &Config, database_path: &Path, targets: &[TargetRef]) -> Result<i32> {
    if targets.is_empty() {
        tracing::warn!("No targets configured; nothing to do");
        return Ok(0);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(watch_interrupts(shutdown_tx));

    let mut orchestrator = CrawlOrchestrator::open(config)
        .with_context(|| format!("Failed to start crawl on {}", database_path.display()))?
        .with_shutdown(shutdown_rx);

    tracing::info!(
        "Known records: {} entries, {} bundles",
        orchestrator.known().entry_count(),
        orchestrator.known().bundle_count()
    );

    let batch = orchestrator.process_targets(targets).await;

    orchestrator.close().context("Failed to close the database")?;

    print_run_summary(&batch);
    Ok(exit_code(&batch))
}
