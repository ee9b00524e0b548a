//! Prometheus metrics for the daemon.
//!
//! HTTP request metrics live here; pipeline metrics come from
//! `sentinel_core::metrics` and are registered alongside them. Scheduler
//! gauges are refreshed from state on every scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "sentinel_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sentinel_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sentinel_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// 1 while a pipeline run is in flight.
pub static RUN_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sentinel_run_in_progress",
        "Whether a pipeline run is currently in flight",
    )
    .unwrap()
});

/// Unix time the last successful run finished, 0 before the first.
pub static LAST_RUN_FINISHED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sentinel_last_run_finished_timestamp_seconds",
        "Finish time of the last successful pipeline run",
    )
    .unwrap()
});

/// Stage failures in the last successful run.
pub static LAST_RUN_STAGES_FAILED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "sentinel_last_run_stages_failed",
        "Failed stages in the last completed pipeline run",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let local: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(RUN_IN_PROGRESS.clone()),
        Box::new(LAST_RUN_FINISHED.clone()),
        Box::new(LAST_RUN_STAGES_FAILED.clone()),
    ];

    for metric in local
        .into_iter()
        .chain(sentinel_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(metric) {
            warn!(error = %e, "Failed to register metric");
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Refresh scheduler gauges from current application state.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.scheduler().status().await;
    RUN_IN_PROGRESS.set(i64::from(status.running));
    if let Some(summary) = status.last_summary {
        LAST_RUN_FINISHED.set(summary.finished_at.timestamp());
        LAST_RUN_STAGES_FAILED.set(summary.stages_failed() as i64);
    }
}

static UUID_RE: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap()
});

/// Normalize a path for metric labels (run ids become `{id}`).
pub fn normalize_path(path: &str) -> String {
    UUID_RE.replace_all(path, "{id}").to_string()
}
