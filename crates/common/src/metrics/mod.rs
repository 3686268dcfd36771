//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming. Recording goes
//! through the `metrics` facade; with no recorder installed every call is a
//! no-op, so library code and tests never need to set one up.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Duration;

/// Metrics prefix for all PaperVault metrics
pub const METRICS_PREFIX: &str = "papervault";

/// Histogram buckets for request-scale latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for uploaded file sizes (in bytes), 16 KiB to 16 MiB
pub const UPLOAD_SIZE_BUCKETS: &[f64] = &[
    16_384.0,
    65_536.0,
    262_144.0,
    1_048_576.0,
    4_194_304.0,
    8_388_608.0,
    16_777_216.0,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Papers successfully ingested"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end ingestion latency in seconds"
    );

    describe_histogram!(
        format!("{}_upload_bytes", METRICS_PREFIX),
        Unit::Bytes,
        "Size of ingested files"
    );

    describe_counter!(
        format!("{}_uploads_rejected_total", METRICS_PREFIX),
        Unit::Count,
        "Uploads rejected, labelled by the stage that failed"
    );

    describe_counter!(
        format!("{}_compensation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Compensating deletes that failed, leaving an orphaned file"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search query latency in seconds"
    );

    describe_histogram!(
        format!("{}_search_results", METRICS_PREFIX),
        Unit::Count,
        "Number of results returned per search"
    );

    tracing::info!("Metrics registered");
}

/// Record a committed upload
pub fn record_upload(duration: Duration, bytes: u64) {
    counter!(format!("{}_uploads_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_upload_duration_seconds", METRICS_PREFIX))
        .record(duration.as_secs_f64());

    histogram!(format!("{}_upload_bytes", METRICS_PREFIX)).record(bytes as f64);
}

/// Record a rejected upload against the stage where it failed
pub fn record_upload_rejected(stage: &'static str) {
    counter!(
        format!("{}_uploads_rejected_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(1);
}

/// Record an orphaned file left behind by a failed rollback
pub fn record_compensation_failure() {
    counter!(format!("{}_compensation_failures_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record search metrics
pub fn record_search(duration: Duration, term_count: usize, result_count: usize) {
    let mode = if term_count == 0 { "list" } else { "query" };

    counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        "mode" => mode
    )
    .increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "mode" => mode
    )
    .record(duration.as_secs_f64());

    histogram!(
        format!("{}_search_results", METRICS_PREFIX),
        "mode" => mode
    )
    .record(result_count as f64);
}
