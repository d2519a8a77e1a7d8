//! Observability for prediction API calls
//!
//! Provides:
//! - Prometheus metrics (request latency and request outcomes per operation)
//! - Structured logging with tracing

use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for API round trips (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<ClientMetricsInner> = OnceLock::new();

/// Operation label values
pub mod operations {
    pub const CLIENT_LOGIN: &str = "client_login";
    pub const TRAIN: &str = "train";
    pub const TRAINING_STATUS: &str = "training_status";
    pub const PREDICT: &str = "predict";
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The service reported success
    Success,
    /// The service answered with an error envelope
    RemoteError,
    /// The call failed locally or on the wire
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::RemoteError => "remote_error",
            Outcome::Failure => "failure",
        }
    }
}

struct ClientMetricsInner {
    request_latency_seconds: HistogramVec,
    requests_total: IntCounterVec,
}

impl ClientMetricsInner {
    fn new() -> Self {
        Self {
            request_latency_seconds: register_histogram_vec!(
                "prediction_client_request_latency_seconds",
                "Round-trip time of prediction API requests",
                &["operation"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            requests_total: register_int_counter_vec!(
                "prediction_client_requests_total",
                "Prediction API requests by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register requests_total"),
        }
    }
}

/// Handle to the process-wide client metrics
///
/// All handles share the same registered collectors.
#[derive(Clone)]
pub struct ClientMetrics {
    _private: (),
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ClientMetricsInner {
        GLOBAL_METRICS.get_or_init(ClientMetricsInner::new)
    }

    pub fn observe_latency(&self, operation: &str, duration_secs: f64) {
        self.inner()
            .request_latency_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }

    pub fn record_outcome(&self, operation: &str, outcome: Outcome) {
        self.inner()
            .requests_total
            .with_label_values(&[operation, outcome.as_str()])
            .inc();
    }

    /// Number of recorded requests for an operation/outcome pair
    pub fn request_count(&self, operation: &str, outcome: Outcome) -> u64 {
        self.inner()
            .requests_total
            .with_label_values(&[operation, outcome.as_str()])
            .get()
    }
}

/// Structured logger for client calls
///
/// Never logs tokens or passwords.
#[derive(Clone, Default)]
pub struct RequestLogger {
    metrics: ClientMetrics,
}

impl RequestLogger {
    pub fn new(metrics: ClientMetrics) -> Self {
        Self { metrics }
    }

    /// Record a finished call in metrics and logs
    pub fn log_completed(
        &self,
        operation: &str,
        dataset: Option<&str>,
        status: Option<u16>,
        elapsed_secs: f64,
        outcome: Outcome,
    ) {
        self.metrics.observe_latency(operation, elapsed_secs);
        self.metrics.record_outcome(operation, outcome);

        match outcome {
            Outcome::Success => info!(
                event = "request_completed",
                operation = %operation,
                dataset = ?dataset,
                status = ?status,
                elapsed_secs = elapsed_secs,
                outcome = outcome.as_str(),
                "Prediction API request completed"
            ),
            Outcome::RemoteError => warn!(
                event = "request_completed",
                operation = %operation,
                dataset = ?dataset,
                status = ?status,
                elapsed_secs = elapsed_secs,
                outcome = outcome.as_str(),
                "Prediction API returned an error envelope"
            ),
            Outcome::Failure => warn!(
                event = "request_failed",
                operation = %operation,
                dataset = ?dataset,
                status = ?status,
                elapsed_secs = elapsed_secs,
                outcome = outcome.as_str(),
                "Prediction API request failed"
            ),
        }
    }

    /// Log a ClientLogin challenge (captcha or bad credentials)
    pub fn log_login_rejected(&self, error: Option<&str>, captcha_required: bool) {
        warn!(
            event = "client_login_rejected",
            error = ?error,
            captcha_required = captcha_required,
            "ClientLogin did not return an auth token"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Success.as_str(), "success");
        assert_eq!(Outcome::RemoteError.as_str(), "remote_error");
        assert_eq!(Outcome::Failure.as_str(), "failure");
    }

    #[test]
    fn test_metrics_record_outcomes() {
        // Counters are process-global, so compare against a baseline
        let metrics = ClientMetrics::new();
        let before = metrics.request_count("metrics_test", Outcome::RemoteError);

        metrics.observe_latency("metrics_test", 0.2);
        metrics.record_outcome("metrics_test", Outcome::RemoteError);
        metrics.record_outcome("metrics_test", Outcome::RemoteError);

        assert_eq!(
            metrics.request_count("metrics_test", Outcome::RemoteError),
            before + 2
        );
    }

    #[test]
    fn test_logger_records_metrics() {
        let logger = RequestLogger::default();
        let metrics = ClientMetrics::new();
        let before = metrics.request_count("logger_test", Outcome::Success);

        logger.log_completed("logger_test", Some("b/o"), Some(200), 0.05, Outcome::Success);

        assert_eq!(metrics.request_count("logger_test", Outcome::Success), before + 1);
    }
}
