//! Prediction orchestration
//!
//! One `run()` call validates the submitted parameters, resolves the model
//! backend, encodes features, runs inference and post-processes the output.
//! Calls share only the read-only schema and the registry cache.

use super::{EncoderConfig, FeatureEncoder, ModelRegistry, OutputConfig, OutputFormatter, RegistryConfig};
use super::FsArtifactLoader;
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::{PredictionError, SchemaWarning};
use crate::health::PipelineHealth;
use crate::models::{ParameterSet, PredictionReport};
use crate::observability::{PipelineLogger, PipelineMetrics};
use crate::schema::{build_schema, validate, Schema, SchemaBuild, SchemaConfig, ValidationOptions};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Clamp out-of-range continuous values instead of rejecting them
    pub clamp: bool,
}

/// Schema, encoder, registry and formatter wired together
pub struct StabilityPipeline {
    schema: Arc<Schema>,
    warnings: Vec<SchemaWarning>,
    encoder: FeatureEncoder,
    registry: ModelRegistry,
    formatter: OutputFormatter,
    slow_inference: Duration,
    metrics: PipelineMetrics,
    logger: PipelineLogger,
}

impl StabilityPipeline {
    /// Assemble a pipeline from a derived schema and a registry
    ///
    /// Fails if a registered model reads a field the schema does not have.
    pub fn new(build: SchemaBuild, registry: ModelRegistry, config: &PipelineConfig) -> Result<Self> {
        let SchemaBuild { schema, warnings } = build;

        for descriptor in registry.descriptors() {
            if let Some(field) = descriptor.input_fields().find(|f| schema.field(f).is_none()) {
                anyhow::bail!("model '{}' reads '{}' which is not a schema field", descriptor.id, field);
            }
        }

        let logger = PipelineLogger::new(config.dataset_path.display().to_string());
        let metrics = PipelineMetrics::new();
        for warning in &warnings {
            let SchemaWarning::LowSignal { field, reason } = warning;
            logger.log_schema_degraded(field, reason);
        }
        metrics.set_degraded_fields(schema.degraded_fields().count());

        let schema = Arc::new(schema);
        let registry = registry.with_schema(schema.clone());
        let encoder = FeatureEncoder::new(
            schema.clone(),
            &EncoderConfig {
                one_hot_max_categories: config.one_hot_max_categories,
            },
        );
        let formatter = OutputFormatter::with_config(OutputConfig {
            lifetime_scale_hours: config.lifetime_scale_hours,
            max_lifetime_hours: config.max_lifetime_hours,
        });

        logger.log_startup(
            env!("CARGO_PKG_VERSION"),
            schema.len(),
            warnings.len(),
            registry.descriptors().len(),
        );

        Ok(Self {
            schema,
            warnings,
            encoder,
            registry,
            formatter,
            slow_inference: Duration::from_millis(config.slow_inference_ms),
            metrics,
            logger,
        })
    }

    /// Build the stock pipeline: dataset from disk, default fields and models
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let dataset = Dataset::from_path(&config.dataset_path)?;
        let schema_config = SchemaConfig {
            continuous_threshold: config.continuous_threshold,
            ..SchemaConfig::default()
        };
        let build = build_schema(&dataset, &schema_config);

        let registry = ModelRegistry::with_default_models(
            FsArtifactLoader::new(&config.models_dir),
            RegistryConfig::from(config),
        )
        .context("Failed to register default models")?;

        Self::new(build, registry, config)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fields that fell back to default domains during derivation
    pub fn warnings(&self) -> &[SchemaWarning] {
        &self.warnings
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn health(&self) -> PipelineHealth {
        PipelineHealth::from_parts(&self.warnings, &self.registry.status())
    }

    /// Predict stability for `params` with `model_id`
    pub async fn run(
        &self,
        params: &ParameterSet,
        model_id: &str,
        options: RunOptions,
    ) -> Result<PredictionReport, PredictionError> {
        let start = Instant::now();
        let result = self.execute(params, model_id, options).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(report) => {
                self.metrics.observe_prediction(model_id, elapsed.as_secs_f64());
                self.logger.log_prediction(
                    model_id,
                    report.stability_score,
                    report.estimated_lifetime_t80_hours,
                    report.uncertainty,
                    elapsed.as_secs_f64() * 1000.0,
                );
            }
            Err(e) => {
                self.metrics.inc_prediction_failure(model_id, e.kind().as_str());
                self.logger
                    .log_prediction_failed(model_id, e.kind().as_str(), e.field(), &e.to_string());
            }
        }
        result
    }

    async fn execute(
        &self,
        params: &ParameterSet,
        model_id: &str,
        options: RunOptions,
    ) -> Result<PredictionReport, PredictionError> {
        let validated = validate(params, &self.schema, ValidationOptions { clamp: options.clamp })?;
        debug!(
            model_id = %model_id,
            notices = validated.notices.len(),
            "Parameters validated"
        );

        let backend = self.registry.get_backend(model_id).await?;
        let descriptor = self
            .registry
            .descriptor(model_id)
            .ok_or_else(|| PredictionError::backend_unavailable(model_id, "model is not registered"))?;

        let reads = backend.input_columns();
        let features = self.encoder.encode(&validated.params, descriptor, &reads)?;
        let unseen = self.encoder.unseen_categories(&validated.params, descriptor, &reads);
        for message in &unseen {
            warn!(model_id = %model_id, "{}", message);
        }
        debug!(
            model_id = %model_id,
            columns = features.len(),
            horizon_hours = ?features.horizon_hours,
            "Features encoded"
        );

        let inference_start = Instant::now();
        let raw = backend
            .predict(&features)
            .map_err(|e| inference_failure(model_id, e))?;
        let inference_time = inference_start.elapsed();
        if inference_time > self.slow_inference {
            warn!(
                model_id = %model_id,
                duration_us = inference_time.as_micros() as u64,
                threshold_ms = self.slow_inference.as_millis() as u64,
                "Inference exceeded latency threshold"
            );
        }

        let result = self
            .formatter
            .format(&raw)
            .map_err(|e| inference_failure(model_id, e))?;

        Ok(PredictionReport {
            model_id: model_id.to_string(),
            stability_score: result.stability_score,
            estimated_lifetime_t80_hours: result.estimated_lifetime_t80_hours,
            uncertainty: result.uncertainty,
            warnings: self
                .warnings
                .iter()
                .map(ToString::to_string)
                .chain(unseen)
                .collect(),
            notices: validated.notices.iter().map(ToString::to_string).collect(),
        })
    }
}

fn inference_failure(model_id: &str, err: crate::error::InferenceError) -> PredictionError {
    PredictionError::InferenceFailure {
        model_id: model_id.to_string(),
        cause: err.to_string(),
    }
}
