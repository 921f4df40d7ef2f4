//! Metrics and observability utilities
//!
//! Metric descriptions are registered once at startup; the helpers below
//! keep naming consistent across crates.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperMind metrics
pub const METRICS_PREFIX: &str = "papermind";

/// Histogram buckets for query latency (in seconds)
/// Generation dominates, so the range reaches into minutes.
pub const QUERY_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
];

/// Buckets for embedding latency
pub const EMBEDDING_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of queries by mode and outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query latency in seconds"
    );

    describe_counter!(
        format!("{}_generation_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Reasoning backend calls that failed"
    );

    describe_counter!(
        format!("{}_analysis_degraded_total", METRICS_PREFIX),
        Unit::Count,
        "Analysis responses that could not be parsed"
    );

    // Retrieval metrics
    describe_counter!(
        format!("{}_retrieval_unavailable_total", METRICS_PREFIX),
        Unit::Count,
        "Searches answered empty because embedding or the index failed"
    );

    describe_counter!(
        format!("{}_retrieval_filtered_total", METRICS_PREFIX),
        Unit::Count,
        "Retrieved chunks dropped by tenant or document filters"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Documents whose chunks reached the vector index"
    );

    describe_counter!(
        format!("{}_documents_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Documents that failed extraction or indexing"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created"
    );

    describe_histogram!(
        format!("{}_ingestion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Document ingestion latency in seconds"
    );

    describe_counter!(
        format!("{}_leaked_vectors_total", METRICS_PREFIX),
        Unit::Count,
        "Deleted documents whose vectors could not be purged"
    );

    describe_counter!(
        format!("{}_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Query requests rejected by the rate limiter"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    tracing::info!("Metrics registered");
}

/// Tracks one query from retrieval to the stored answer
pub struct QueryMetrics {
    start: Instant,
    mode: &'static str,
}

impl QueryMetrics {
    /// Start tracking a query
    pub fn start(mode: &'static str) -> Self {
        Self {
            start: Instant::now(),
            mode,
        }
    }

    /// Record query completion
    pub fn finish(self, success: bool) {
        let outcome = if success { "success" } else { "error" };

        counter!(
            format!("{}_queries_total", METRICS_PREFIX),
            "mode" => self.mode,
            "outcome" => outcome
        )
        .increment(1);

        histogram!(
            format!("{}_query_duration_seconds", METRICS_PREFIX),
            "mode" => self.mode
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record a search that degraded to an empty result
pub fn record_retrieval_unavailable(stage: &'static str) {
    counter!(
        format!("{}_retrieval_unavailable_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(1);
}

/// Helper to record chunks dropped by a filter
pub fn record_filtered(filter: &'static str, dropped: usize) {
    if dropped == 0 {
        return;
    }

    counter!(
        format!("{}_retrieval_filtered_total", METRICS_PREFIX),
        "filter" => filter
    )
    .increment(dropped as u64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record a finished document ingestion
pub fn record_ingestion(duration_secs: f64, chunks_created: usize, indexed: bool) {
    if indexed {
        counter!(format!("{}_documents_indexed_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_documents_failed_total", METRICS_PREFIX)).increment(1);
    }

    counter!(format!("{}_chunks_created_total", METRICS_PREFIX))
        .increment(chunks_created as u64);

    histogram!(format!("{}_ingestion_duration_seconds", METRICS_PREFIX))
        .record(duration_secs);
}

/// Helper to record a reasoning backend failure
pub fn record_generation_failure(mode: &'static str) {
    counter!(
        format!("{}_generation_failures_total", METRICS_PREFIX),
        "mode" => mode
    )
    .increment(1);
}

/// Helper to record an analysis answered with the degraded report
pub fn record_analysis_degraded() {
    counter!(format!("{}_analysis_degraded_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a request turned away by the rate limiter
pub fn record_rate_limited() {
    counter!(format!("{}_rate_limited_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record vectors left behind by a document deletion
pub fn record_leaked_vectors() {
    counter!(format!("{}_leaked_vectors_total", METRICS_PREFIX)).increment(1);
}
