//! Prometheus metrics for core components.
//!
//! Covers discovery, acquisition, stage execution, whole runs and calls to
//! the Copernicus services.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Discovery
// =============================================================================

/// Products returned by the catalogue, after cross-region dedup.
pub static PRODUCTS_DISCOVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sentinel_products_discovered_total",
            "Total products returned by catalog searches",
        ),
        &["family"],
    )
    .unwrap()
});

/// Products not present in the previous watermark.
pub static PRODUCTS_NEW: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sentinel_products_new_total", "Total newly discovered products"),
        &["family"],
    )
    .unwrap()
});

/// Region searches that failed.
pub static REGION_SEARCH_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sentinel_region_search_failures_total",
            "Total region searches that failed",
        ),
        &["family"],
    )
    .unwrap()
});

// =============================================================================
// Acquisition
// =============================================================================

/// Acquisitions by result.
pub static ACQUISITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sentinel_acquisitions_total", "Total product acquisitions"),
        &["result"], // "downloaded", "extracted", "cached", "failed"
    )
    .unwrap()
});

/// Download retries with a fresh token.
pub static DOWNLOAD_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "sentinel_download_retries_total",
        "Total download retries after a failed transfer",
    )
    .unwrap()
});

/// Archive download duration in seconds.
pub static DOWNLOAD_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sentinel_download_duration_seconds",
            "Duration of archive downloads",
        )
        .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Stages
// =============================================================================

/// Stage invocations by outcome.
pub static STAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sentinel_stages_total", "Total derived-product stage runs"),
        &["stage", "outcome"], // outcome: "computed", "skipped", "failed"
    )
    .unwrap()
});

/// Stage compute duration in seconds (computed outcomes only).
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sentinel_stage_duration_seconds",
            "Duration of derived-product computation",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Runs
// =============================================================================

/// Pipeline runs by result.
pub static RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sentinel_runs_total", "Total pipeline runs"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Pipeline run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("sentinel_run_duration_seconds", "Duration of pipeline runs")
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sentinel_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Discovery
        Box::new(PRODUCTS_DISCOVERED.clone()),
        Box::new(PRODUCTS_NEW.clone()),
        Box::new(REGION_SEARCH_FAILURES.clone()),
        // Acquisition
        Box::new(ACQUISITIONS_TOTAL.clone()),
        Box::new(DOWNLOAD_RETRIES.clone()),
        Box::new(DOWNLOAD_DURATION.clone()),
        // Stages
        Box::new(STAGES_TOTAL.clone()),
        Box::new(STAGE_DURATION.clone()),
        // Runs
        Box::new(RUNS_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}
