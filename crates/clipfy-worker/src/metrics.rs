//! Prometheus metrics for the batch worker.
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

use clipfy_models::BatchKind;

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const BATCHES_STARTED_TOTAL: &str = "clipfy_batches_started_total";
    pub const BATCHES_FINISHED_TOTAL: &str = "clipfy_batches_finished_total";
    pub const BATCH_DURATION_SECONDS: &str = "clipfy_batch_duration_seconds";
    pub const ITEMS_PROCESSED_TOTAL: &str = "clipfy_items_processed_total";
    pub const ITEMS_SKIPPED_TOTAL: &str = "clipfy_items_skipped_total";
    pub const FALLBACK_ATTEMPTS_TOTAL: &str = "clipfy_fallback_attempts_total";
    pub const ENCODER_DURATION_SECONDS: &str = "clipfy_encoder_duration_seconds";
}

/// Record a batch entering the item loop.
pub fn record_batch_started(kind: BatchKind) {
    counter!(names::BATCHES_STARTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record a batch leaving the item loop with `outcome` (completed, cancelled, ...).
pub fn record_batch_finished(kind: BatchKind, outcome: &'static str, duration_secs: f64) {
    let labels = [("kind", kind.as_str()), ("outcome", outcome)];
    counter!(names::BATCHES_FINISHED_TOTAL, &labels).increment(1);
    histogram!(names::BATCH_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_item_processed(kind: BatchKind) {
    counter!(names::ITEMS_PROCESSED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_item_skipped(kind: BatchKind) {
    counter!(names::ITEMS_SKIPPED_TOTAL, "kind" => kind.as_str()).increment(1);
}

pub fn record_fallback_attempt(kind: BatchKind) {
    counter!(names::FALLBACK_ATTEMPTS_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record one encoder invocation.
pub fn record_encoder_run(kind: BatchKind, success: bool, duration_secs: f64) {
    let labels = [
        ("kind", kind.as_str()),
        ("success", if success { "true" } else { "false" }),
    ];
    histogram!(names::ENCODER_DURATION_SECONDS, &labels).record(duration_secs);
}
