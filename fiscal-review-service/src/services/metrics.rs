//! Prometheus metrics for fiscal-review-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for gRPC requests by method and status.
pub static GRPC_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_grpc_requests_total",
        "Total number of gRPC requests",
        &["method", "status"]
    )
    .expect("Failed to register GRPC_REQUESTS")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "fiscal_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for verdicts recorded, by verdict status.
pub static VERDICTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_verdicts_total",
        "Total number of verdicts recorded",
        &["status"]
    )
    .expect("Failed to register VERDICTS")
});

/// Counter for diligence events (opened, confirmed).
pub static DILIGENCE_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_diligence_events_total",
        "Total number of diligence events",
        &["event"]
    )
    .expect("Failed to register DILIGENCE_EVENTS")
});

/// Counter for signature attempts by role and outcome.
pub static SIGNATURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_signatures_total",
        "Total number of signature attempts",
        &["role", "outcome"]
    )
    .expect("Failed to register SIGNATURES")
});

/// Counter for finalization attempts by outcome.
pub static FINALIZATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_finalizations_total",
        "Total number of report finalization attempts",
        &["outcome"]
    )
    .expect("Failed to register FINALIZATIONS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "fiscal_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&GRPC_REQUESTS);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&VERDICTS);
    Lazy::force(&DILIGENCE_EVENTS);
    Lazy::force(&SIGNATURES);
    Lazy::force(&FINALIZATIONS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a gRPC request.
pub fn record_grpc_request(method: &str, status: &str) {
    GRPC_REQUESTS.with_label_values(&[method, status]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}

/// Record a verdict.
pub fn record_verdict(status: &str) {
    VERDICTS.with_label_values(&[status]).inc();
}

/// Record a diligence event.
pub fn record_diligence_event(event: &str) {
    DILIGENCE_EVENTS.with_label_values(&[event]).inc();
}

/// Record a signature attempt.
pub fn record_signature(role: &str, outcome: &str) {
    SIGNATURES.with_label_values(&[role, outcome]).inc();
}

/// Record a finalization attempt.
pub fn record_finalization(outcome: &str) {
    FINALIZATIONS.with_label_values(&[outcome]).inc();
}
