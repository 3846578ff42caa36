//! Observability infrastructure for the prediction gateway
//!
//! Provides:
//! - Prometheus metrics (prediction latency, request and error counts, model state)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<GatewayMetricsInner> = OnceLock::new();

struct GatewayMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    neighbor_fallbacks_total: IntCounterVec,
    model_loaded: IntGaugeVec,
}

impl GatewayMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "bp_gateway_prediction_latency_seconds",
                "Time spent aligning, scaling and evaluating one prediction",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "bp_gateway_predictions_total",
                "Total number of predictions served",
                &["model", "input_type"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "bp_gateway_prediction_errors_total",
                "Total number of failed prediction requests",
                &["model", "kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            neighbor_fallbacks_total: register_int_counter_vec!(
                "bp_gateway_neighbor_fallbacks_total",
                "Neighbor queries that failed and collapsed the confidence interval",
                &["model"]
            )
            .expect("Failed to register neighbor_fallbacks_total"),

            model_loaded: register_int_gauge_vec!(
                "bp_gateway_model_loaded",
                "1 when the model is loaded and serving, 0 when its load failed",
                &["model"]
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Gateway metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct GatewayMetrics {
    _private: (),
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(GatewayMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &GatewayMetricsInner {
        GLOBAL_METRICS.get_or_init(GatewayMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, model: &str, duration_secs: f64) {
        self.inner()
            .prediction_latency_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
    }

    pub fn inc_predictions(&self, model: &str, input_type: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[model, input_type])
            .inc();
    }

    pub fn inc_prediction_errors(&self, model: &str, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[model, kind])
            .inc();
    }

    pub fn inc_neighbor_fallbacks(&self, model: &str) {
        self.inner()
            .neighbor_fallbacks_total
            .with_label_values(&[model])
            .inc();
    }

    pub fn set_model_loaded(&self, model: &str, loaded: bool) {
        self.inner()
            .model_loaded
            .with_label_values(&[model])
            .set(i64::from(loaded));
    }

    #[cfg(test)]
    pub(crate) fn neighbor_fallbacks(&self, model: &str) -> u64 {
        self.inner()
            .neighbor_fallbacks_total
            .with_label_values(&[model])
            .get()
    }
}

/// Structured logger for gateway events
///
/// Provides consistent JSON-formatted logging for startup, model loading
/// and served predictions.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log gateway startup
    pub fn log_startup(&self, version: &str, bind_addr: &str) {
        info!(
            event = "gateway_started",
            instance = %self.instance,
            gateway_version = %version,
            bind_addr = %bind_addr,
            "Prediction gateway started"
        );
    }

    /// Log gateway shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "gateway_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prediction gateway shutting down"
        );
    }

    pub fn log_model_loaded(&self, model: &str, scaler_loaded: bool) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model = %model,
            scaler_loaded = scaler_loaded,
            "Model ready"
        );
    }

    pub fn log_model_load_failed(&self, model: &str, reason: &str) {
        warn!(
            event = "model_load_failed",
            instance = %self.instance,
            model = %model,
            reason = %reason,
            "Model failed to load, its endpoint will answer 503"
        );
    }

    /// Log a served prediction; `value` is the class id or the mmHg estimate
    pub fn log_prediction(&self, model: &str, input_type: &str, value: f64, latency_secs: f64) {
        info!(
            event = "prediction_served",
            instance = %self.instance,
            model = %model,
            input_type = %input_type,
            value = value,
            latency_ms = latency_secs * 1000.0,
            "Prediction served"
        );
    }

    /// Log a neighbor query failure that collapsed the confidence interval
    pub fn log_neighbor_fallback(&self, model: &str, error: &str) {
        warn!(
            event = "neighbor_fallback",
            instance = %self.instance,
            model = %model,
            error = %error,
            "Neighbor query failed, reporting zero prediction uncertainty"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_metrics_creation() {
        let metrics = GatewayMetrics::new();

        metrics.observe_prediction_latency("random_forest", 0.0002);
        metrics.inc_predictions("random_forest", "raw");
        metrics.inc_prediction_errors("knn_systolic", "scaler_unavailable");
        metrics.set_model_loaded("knn_diastolic", false);

        let before = metrics.neighbor_fallbacks("metrics_test");
        GatewayMetrics::new().inc_neighbor_fallbacks("metrics_test");
        assert_eq!(metrics.neighbor_fallbacks("metrics_test"), before + 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("gateway-0");
        assert_eq!(logger.instance, "gateway-0");
    }
}
