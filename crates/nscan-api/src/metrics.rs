//! Prometheus metrics for the API server.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const CLASSIFY_REQUESTS_TOTAL: &str = "nscan_classify_requests_total";
    pub const CLASSIFY_DURATION_SECONDS: &str = "nscan_classify_duration_seconds";
}

/// Record one classification attempt.
pub fn record_classification(outcome: &'static str, duration_secs: f64) {
    let labels = [("outcome", outcome)];
    counter!(names::CLASSIFY_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::CLASSIFY_DURATION_SECONDS, &labels).record(duration_secs);
}
