//! End-of-run summary of a batch

use crate::crawler::BatchReport;
use crate::state::CrawlOutcome;
use std::fmt::Write;

/// Renders a batch report as plain text, one line per target
pub fn format_run_summary(batch: &BatchReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Run Summary ===\n");
    let _ = writeln!(out, "Targets processed: {}", batch.reports.len());
    let _ = writeln!(out, "  Cache hits: {}", batch.cache_hits());
    let _ = writeln!(out, "  Freshly scraped: {}", batch.freshly_scraped());
    let _ = writeln!(out, "  Bundle lists expanded: {}", batch.expanded());
    let _ = writeln!(out, "  Failed: {}", batch.failures());
    let _ = writeln!(out, "Politeness delays: {}", batch.delays_applied);
    if batch.interrupted {
        let _ = writeln!(out, "Run was interrupted before all targets were processed");
    }

    if !batch.reports.is_empty() {
        let _ = writeln!(out, "\nTargets:");
    }
    for report in &batch.reports {
        let hash = report.hash.as_deref().unwrap_or("-");
        let _ = writeln!(out, "  {:<16} {} {}", hash, report.target, report.outcome);
    }

    out
}

/// Prints the run summary to stdout
pub fn print_run_summary(batch: &BatchReport) {
    print!("{}", format_run_summary(batch));
}

/// Exit status for a finished batch: non-zero when every target failed
pub fn exit_code(batch: &BatchReport) -> i32 {
    let all_failed = !batch.reports.is_empty()
        && batch
            .reports
            .iter()
            .all(|report| matches!(report.outcome, CrawlOutcome::Failed(_)));
    if all_failed {
        1
    } else {
        0
    }
}
