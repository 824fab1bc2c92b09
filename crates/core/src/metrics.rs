//! Prometheus metrics emitted by core components: worker runs and LLM calls.
//! HTTP/WebSocket instrumentation lives in the server crate's `metrics.rs`,
//! which registers these alongside its own.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Worker run metrics
// =============================================================================

/// Worker runs total by outcome.
pub static WORKER_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("quarryscout_worker_runs_total", "Total worker runs"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Worker run duration in seconds.
pub static WORKER_RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "quarryscout_worker_run_duration_seconds",
            "Duration of a full worker run",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &[],
    )
    .unwrap()
});

/// Matches found per worker run.
pub static WORKER_MATCHES_FOUND: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "quarryscout_worker_matches_found",
            "Number of matches found per worker run",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &[],
    )
    .unwrap()
});

/// Site searches that failed per worker run.
pub static WORKER_SITES_FAILED: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "quarryscout_worker_sites_failed",
            "Number of site searches that failed per worker run",
        )
        .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// LLM entity extraction metrics
// =============================================================================

/// Entity extraction attempts total.
pub static ENTITY_EXTRACTION_ATTEMPTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "quarryscout_entity_extraction_attempts_total",
        "Total entity extraction calls made to the LLM endpoint",
    )
    .unwrap()
});

/// Entity extraction failures total.
pub static ENTITY_EXTRACTION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "quarryscout_entity_extraction_failures_total",
        "Total entity extraction calls that failed or returned unparseable output",
    )
    .unwrap()
});

/// Get all core metrics for registration in the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(WORKER_RUNS_TOTAL.clone()),
        Box::new(WORKER_RUN_DURATION.clone()),
        Box::new(WORKER_MATCHES_FOUND.clone()),
        Box::new(WORKER_SITES_FAILED.clone()),
        Box::new(ENTITY_EXTRACTION_ATTEMPTS.clone()),
        Box::new(ENTITY_EXTRACTION_FAILURES.clone()),
    ]
}
