//! Observability infrastructure for the stability pipeline
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes per model, backend loads)
//! - Structured logging with tracing

use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    prediction_latency_seconds: HistogramVec,
    predictions_total: IntCounterVec,
    prediction_failures_total: IntCounterVec,
    backend_loads_total: IntCounterVec,
    schema_degraded_fields: IntGauge,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram_vec!(
                "psp_prediction_latency_seconds",
                "End-to-end latency of a prediction call",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "psp_predictions_total",
                "Predictions generated",
                &["model"]
            )
            .expect("Failed to register predictions_total"),

            prediction_failures_total: register_int_counter_vec!(
                "psp_prediction_failures_total",
                "Prediction calls that returned an error",
                &["model", "error_kind"]
            )
            .expect("Failed to register prediction_failures_total"),

            backend_loads_total: register_int_counter_vec!(
                "psp_backend_loads_total",
                "Backend load attempts by outcome",
                &["model", "outcome"]
            )
            .expect("Failed to register backend_loads_total"),

            schema_degraded_fields: register_int_gauge!(
                "psp_schema_degraded_fields",
                "Schema fields running on fallback domains"
            )
            .expect("Failed to register schema_degraded_fields"),
        }
    }
}

/// Handle to the process-wide pipeline metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_prediction(&self, model_id: &str, duration_secs: f64) {
        let inner = self.inner();
        inner
            .prediction_latency_seconds
            .with_label_values(&[model_id])
            .observe(duration_secs);
        inner.predictions_total.with_label_values(&[model_id]).inc();
    }

    pub fn inc_prediction_failure(&self, model_id: &str, error_kind: &str) {
        self.inner()
            .prediction_failures_total
            .with_label_values(&[model_id, error_kind])
            .inc();
    }

    pub fn inc_backend_load(&self, model_id: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.inner()
            .backend_loads_total
            .with_label_values(&[model_id, outcome])
            .inc();
    }

    pub fn set_degraded_fields(&self, count: usize) {
        self.inner().schema_degraded_fields.set(count as i64);
    }

    pub fn predictions(&self, model_id: &str) -> u64 {
        self.inner().predictions_total.with_label_values(&[model_id]).get()
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct PipelineLogger {
    dataset: String,
}

impl PipelineLogger {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
        }
    }

    pub fn log_startup(&self, version: &str, fields: usize, degraded: usize, models: usize) {
        info!(
            event = "pipeline_started",
            dataset = %self.dataset,
            version = %version,
            fields = fields,
            degraded_fields = degraded,
            models = models,
            "Stability pipeline ready"
        );
    }

    pub fn log_schema_degraded(&self, field: &str, reason: &str) {
        warn!(
            event = "schema_degraded",
            dataset = %self.dataset,
            field = %field,
            reason = %reason,
            "Schema field running on fallback domain"
        );
    }

    pub fn log_prediction(
        &self,
        model_id: &str,
        stability_score: f64,
        t80_hours: f64,
        uncertainty: Option<f64>,
        latency_ms: f64,
    ) {
        info!(
            event = "prediction_generated",
            dataset = %self.dataset,
            model_id = %model_id,
            stability_score = stability_score,
            t80_hours = t80_hours,
            uncertainty = ?uncertainty,
            latency_ms = latency_ms,
            "Generated stability prediction"
        );
    }

    pub fn log_prediction_failed(&self, model_id: &str, error_kind: &str, field: Option<&str>, message: &str) {
        warn!(
            event = "prediction_failed",
            dataset = %self.dataset,
            model_id = %model_id,
            error_kind = %error_kind,
            field = ?field,
            message = %message,
            "Prediction failed"
        );
    }

    pub fn log_backend_loaded(&self, model_id: &str, kind: &str, checksum: Option<&str>, load_ms: f64) {
        info!(
            event = "backend_loaded",
            model_id = %model_id,
            backend_kind = %kind,
            checksum = ?checksum,
            load_ms = load_ms,
            "Model backend loaded"
        );
    }

    pub fn log_backend_unavailable(&self, model_id: &str, cause: &str) {
        error!(
            event = "backend_unavailable",
            model_id = %model_id,
            cause = %cause,
            "Model backend unavailable"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_state() {
        let a = PipelineMetrics::new();
        let b = a.clone();
        let before = b.predictions("metrics-test-model");
        a.observe_prediction("metrics-test-model", 0.001);
        assert_eq!(b.predictions("metrics-test-model"), before + 1);
    }

    #[test]
    fn test_render_includes_metric_names() {
        let metrics = PipelineMetrics::new();
        metrics.inc_backend_load("render-test-model", true);
        metrics.set_degraded_fields(2);
        let text = metrics.render().unwrap();
        assert!(text.contains("psp_backend_loads_total"));
        assert!(text.contains("psp_schema_degraded_fields"));
    }
}
