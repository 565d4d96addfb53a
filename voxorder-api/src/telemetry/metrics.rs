//! Prometheus Metrics Definitions
//!
//! Defines all VOXORDER metrics with their labels.
//! Exposes a /metrics endpoint for Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once on first use
pub static METRICS: Lazy<ApiResult<VoxorderMetrics>> = Lazy::new(VoxorderMetrics::new);

/// Container for all VOXORDER metrics.
#[derive(Clone)]
pub struct VoxorderMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Callback outcome counter - labels: outcome
    pub callbacks_total: CounterVec,

    /// Store operation counter - labels: operation, status
    pub store_operations_total: CounterVec,
}

impl VoxorderMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "voxorder_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {}", e)))?,

            http_request_duration_seconds: register_histogram_vec!(
                "voxorder_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {}", e)))?,

            callbacks_total: register_counter_vec!(
                "voxorder_callbacks_total",
                "Processed voice callbacks by outcome",
                &["outcome"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register callbacks_total: {}", e)))?,

            store_operations_total: register_counter_vec!(
                "voxorder_store_operations_total",
                "Total number of store operations",
                &["operation", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register store_operations_total: {}", e)))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record the outcome of one callback (`committed`, `ignored`, or an error code).
    pub fn record_callback(&self, outcome: &str) {
        self.callbacks_total.with_label_values(&[outcome]).inc();
    }

    /// Record a store or directory operation.
    pub fn record_store_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
    }
}

/// Record against the global registry, if it initialized.
pub fn with_metrics(f: impl FnOnce(&VoxorderMetrics)) {
    match METRICS.as_ref() {
        Ok(metrics) => f(metrics),
        Err(e) => tracing::debug!(error = %e, "Metrics unavailable"),
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure our families exist even before the first request is recorded.
    Lazy::force(&METRICS);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static VoxorderMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        assert!(!metrics()?.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_callback_outcomes() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics.callbacks_total.with_label_values(&["ignored"]).get();
        metrics.record_callback("ignored");
        let after = metrics.callbacks_total.with_label_values(&["ignored"]).get();
        assert!(after >= before + 1.0);
        Ok(())
    }

    #[test]
    fn test_record_store_operation() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_store_operation("insert_order", true);
        metrics.record_store_operation("find_user", false);
        assert!(metrics
            .store_operations_total
            .with_label_values(&["find_user", "error"])
            .get() >= 1.0);
        Ok(())
    }
}
