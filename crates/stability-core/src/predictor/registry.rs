//! Model registry with lazily loaded, cached backends
//!
//! Each registered id owns an async once-cell. The first caller loads the
//! artifact and every concurrent caller awaits that same load. A failed load
//! leaves the cell empty so the next call tries again, and one id failing
//! never touches another id's cell.

use super::inference::{parse_manifest, EnsembleBackend, ModelSpec, NativeBackend, TractBackend};
use super::{Backend, BackendKind, ModelDescriptor};
use crate::config::PipelineConfig;
use crate::error::{LoadError, PredictionError};
use crate::observability::{PipelineLogger, PipelineMetrics};
use crate::schema::{columns, Schema};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Source of artifact bytes
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    /// Read the artifact at `location`
    async fn load(&self, location: &str) -> Result<Vec<u8>, LoadError>;
}

/// Loads artifacts from a directory on disk
#[derive(Debug, Clone)]
pub struct FsArtifactLoader {
    root: PathBuf,
}

impl FsArtifactLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactLoader for FsArtifactLoader {
    async fn load(&self, location: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.root.join(location);
        tokio::fs::read(&path).await.map_err(|e| {
            let transient = matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            );
            let err = anyhow::Error::new(e).context(format!("Failed to read {}", path.display()));
            if transient {
                LoadError::Transient(err)
            } else {
                LoadError::Fatal(err)
            }
        })
    }
}

/// In-memory artifacts, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticArtifactLoader {
    artifacts: HashMap<String, Vec<u8>>,
}

impl StaticArtifactLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.artifacts.insert(location.into(), bytes.into());
        self
    }
}

#[async_trait]
impl ArtifactLoader for StaticArtifactLoader {
    async fn load(&self, location: &str) -> Result<Vec<u8>, LoadError> {
        self.artifacts
            .get(location)
            .cloned()
            .ok_or_else(|| LoadError::Fatal(anyhow::anyhow!("no artifact at '{}'", location)))
    }
}

/// Loading limits
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound on a single artifact read
    pub load_timeout: Duration,
    /// Pause before retrying a transient failure
    pub retry_backoff: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl From<&PipelineConfig> for RegistryConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            load_timeout: config.load_timeout(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Load state of one registered model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BackendState {
    NotLoaded,
    Ready {
        /// SHA-256 of the manifest, absent for ensembles
        #[serde(skip_serializing_if = "Option::is_none")]
        checksum: Option<String>,
        loaded_at: DateTime<Utc>,
    },
    /// Last load failed; the next call retries
    Unavailable { cause: String, failed_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendStatus {
    pub model_id: String,
    pub backend_kind: BackendKind,
    #[serde(flatten)]
    pub state: BackendState,
}

type BackendCell = Arc<OnceCell<Arc<dyn Backend>>>;

/// Builder checking descriptors before the registry is sealed
pub struct ModelRegistryBuilder {
    descriptors: Vec<ModelDescriptor>,
    loader: Option<Arc<dyn ArtifactLoader>>,
    config: RegistryConfig,
}

impl ModelRegistryBuilder {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            loader: None,
            config: RegistryConfig::default(),
        }
    }

    pub fn register(mut self, descriptor: ModelDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn loader(mut self, loader: impl ArtifactLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn shared_loader(mut self, loader: Arc<dyn ArtifactLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> anyhow::Result<ModelRegistry> {
        let loader = self.loader.context("Model registry needs an artifact loader")?;

        let mut index = HashMap::new();
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            if index.insert(descriptor.id.clone(), i).is_some() {
                anyhow::bail!("model '{}' registered twice", descriptor.id);
            }
        }
        for descriptor in &self.descriptors {
            check_descriptor(descriptor, &self.descriptors, &index)
                .with_context(|| format!("Invalid descriptor for model '{}'", descriptor.id))?;
        }

        let cells = self
            .descriptors
            .iter()
            .map(|d| (d.id.clone(), BackendCell::default()))
            .collect();
        let states = self
            .descriptors
            .iter()
            .map(|d| (d.id.clone(), BackendState::NotLoaded))
            .collect();

        Ok(ModelRegistry {
            descriptors: self.descriptors,
            index,
            loader,
            config: self.config,
            cells,
            states,
            schema: None,
            metrics: PipelineMetrics::new(),
            logger: PipelineLogger::new("model-registry"),
        })
    }
}

impl Default for ModelRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_descriptor(
    descriptor: &ModelDescriptor,
    all: &[ModelDescriptor],
    index: &HashMap<String, usize>,
) -> anyhow::Result<()> {
    let mut seen = HashSet::new();
    for feature in &descriptor.required_features {
        if !seen.insert(feature) {
            anyhow::bail!("feature '{}' listed twice", feature);
        }
    }

    match descriptor.backend_kind {
        BackendKind::Tabular | BackendKind::SequenceCurve => {
            if descriptor.artifact.is_none() {
                anyhow::bail!("no artifact location");
            }
            if descriptor.ensemble.is_some() {
                anyhow::bail!("only ensembles name members");
            }
            if (descriptor.backend_kind == BackendKind::SequenceCurve) != descriptor.time_axis.is_some() {
                anyhow::bail!("a time axis is required for sequence-curve models and only for them");
            }
        }
        BackendKind::Ensemble => {
            let spec = descriptor.ensemble.as_ref().context("ensemble has no members")?;
            if !(0.0..=1.0).contains(&spec.tabular_weight) {
                anyhow::bail!("tabular weight {} outside [0, 1]", spec.tabular_weight);
            }
            for (member, kind) in [
                (&spec.tabular, BackendKind::Tabular),
                (&spec.sequence, BackendKind::SequenceCurve),
            ] {
                let member = index
                    .get(member)
                    .map(|&i| &all[i])
                    .with_context(|| format!("member '{}' is not registered", member))?;
                if member.backend_kind != kind {
                    anyhow::bail!("member '{}' is {}, expected {}", member.id, member.backend_kind, kind);
                }
                if let Some(missing) = member
                    .input_fields()
                    .find(|f| !descriptor.input_fields().any(|g| g == *f))
                {
                    anyhow::bail!("member '{}' reads '{}' which the ensemble does not", member.id, missing);
                }
            }
        }
    }
    Ok(())
}

/// Registered models and their cached backends
pub struct ModelRegistry {
    descriptors: Vec<ModelDescriptor>,
    index: HashMap<String, usize>,
    loader: Arc<dyn ArtifactLoader>,
    config: RegistryConfig,
    cells: DashMap<String, BackendCell>,
    states: DashMap<String, BackendState>,
    /// Checked against each artifact's input columns at load
    schema: Option<Arc<Schema>>,
    metrics: PipelineMetrics,
    logger: PipelineLogger,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::new()
    }

    /// The five stock models, loading artifacts through `loader`
    pub fn with_default_models(
        loader: impl ArtifactLoader + 'static,
        config: RegistryConfig,
    ) -> anyhow::Result<Self> {
        default_descriptors()
            .into_iter()
            .fold(Self::builder(), ModelRegistryBuilder::register)
            .loader(loader)
            .config(config)
            .build()
    }

    /// Check artifacts against `schema` when they load
    ///
    /// An artifact reading `field=value` indicators for a field the schema
    /// holds as continuous is then reported unavailable instead of reading
    /// constant zeros.
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn descriptor(&self, model_id: &str) -> Option<&ModelDescriptor> {
        self.index.get(model_id).map(|&i| &self.descriptors[i])
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.id.as_str())
    }

    pub fn status(&self) -> Vec<BackendStatus> {
        self.descriptors
            .iter()
            .map(|d| BackendStatus {
                model_id: d.id.clone(),
                backend_kind: d.backend_kind,
                state: self
                    .states
                    .get(&d.id)
                    .map(|s| s.value().clone())
                    .unwrap_or(BackendState::NotLoaded),
            })
            .collect()
    }

    /// Resolve the backend for `model_id`, loading it on first use
    pub async fn get_backend(&self, model_id: &str) -> Result<Arc<dyn Backend>, PredictionError> {
        let descriptor = self
            .descriptor(model_id)
            .ok_or_else(|| PredictionError::backend_unavailable(model_id, "model is not registered"))?;

        let cell = self.cell(model_id);
        if let Some(backend) = cell.get() {
            return Ok(backend.clone());
        }

        let start = Instant::now();
        let result = cell
            .get_or_try_init(|| self.load(descriptor))
            .await
            .cloned();

        match &result {
            Ok(_) => debug!(
                model_id = %model_id,
                elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Backend resolved"
            ),
            Err(e) => {
                self.mark_unavailable(model_id, e);
            }
        }
        result
    }

    fn cell(&self, model_id: &str) -> BackendCell {
        self.cells.entry(model_id.to_string()).or_default().clone()
    }

    async fn load(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn Backend>, PredictionError> {
        let spec = match &descriptor.ensemble {
            Some(spec) => spec,
            None => return self.load_leaf(descriptor).await,
        };

        let start = Instant::now();
        let tabular = self.member(descriptor, &spec.tabular).await?;
        let sequence = self.member(descriptor, &spec.sequence).await?;
        let backend: Arc<dyn Backend> = Arc::new(
            EnsembleBackend::new(tabular, sequence, spec.tabular_weight)
                .map_err(|e| PredictionError::backend_unavailable(&descriptor.id, format!("{:#}", e)))?,
        );
        self.mark_ready(descriptor, &backend, None, start);
        Ok(backend)
    }

    /// Ensemble member through the shared cache
    ///
    /// Members are never ensembles, so this goes straight to `load_leaf`.
    async fn member(&self, ensemble: &ModelDescriptor, member_id: &str) -> Result<Arc<dyn Backend>, PredictionError> {
        let member = self.descriptor(member_id).ok_or_else(|| {
            PredictionError::backend_unavailable(&ensemble.id, format!("member '{}' is not registered", member_id))
        })?;
        let cell = self.cell(member_id);
        let result = cell.get_or_try_init(|| self.load_leaf(member)).await.cloned();
        result.map_err(|e| {
            let cause = self.mark_unavailable(member_id, &e);
            PredictionError::backend_unavailable(&ensemble.id, format!("member '{}': {}", member_id, cause))
        })
    }

    async fn load_leaf(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn Backend>, PredictionError> {
        let start = Instant::now();
        let (backend, checksum) = self.load_artifact(descriptor).await?;
        self.mark_ready(descriptor, &backend, Some(checksum), start);
        Ok(backend)
    }

    fn mark_ready(&self, descriptor: &ModelDescriptor, backend: &Arc<dyn Backend>, checksum: Option<String>, start: Instant) {
        self.metrics.inc_backend_load(&descriptor.id, true);
        self.logger.log_backend_loaded(
            &descriptor.id,
            &backend.kind().to_string(),
            checksum.as_deref(),
            start.elapsed().as_secs_f64() * 1000.0,
        );
        self.states.insert(
            descriptor.id.clone(),
            BackendState::Ready {
                checksum,
                loaded_at: Utc::now(),
            },
        );
    }

    /// Record a failed load, returning its cause
    fn mark_unavailable(&self, model_id: &str, err: &PredictionError) -> String {
        let cause = match err {
            PredictionError::BackendUnavailable { cause, .. } => cause.clone(),
            other => other.to_string(),
        };
        self.metrics.inc_backend_load(model_id, false);
        self.logger.log_backend_unavailable(model_id, &cause);
        self.states.insert(
            model_id.to_string(),
            BackendState::Unavailable {
                cause: cause.clone(),
                failed_at: Utc::now(),
            },
        );
        cause
    }

    async fn load_artifact(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<(Arc<dyn Backend>, String), PredictionError> {
        let model_id = descriptor.id.as_str();
        let location = descriptor
            .artifact
            .as_deref()
            .ok_or_else(|| PredictionError::backend_unavailable(model_id, "no artifact location"))?;

        let bytes = self.fetch(model_id, location).await?;
        let checksum = hex::encode(Sha256::digest(&bytes));

        let owned = descriptor.clone();
        let schema = self.schema.clone();
        let (manifest, absent) = blocking(model_id, move || {
            let manifest = parse_manifest(&bytes)?;
            manifest.check_compatible(&owned)?;
            let absent = match &schema {
                Some(schema) => manifest.check_encodable(schema)?,
                None => Vec::new(),
            };
            Ok((manifest, absent))
        })
        .await?;
        if !absent.is_empty() {
            warn!(
                model_id = %model_id,
                columns = ?absent,
                "Artifact reads categories absent from the dataset; they always encode as 0"
            );
        }

        let onnx = match &manifest.model {
            ModelSpec::Onnx { model_file, output } => Some((model_file.clone(), *output)),
            _ => None,
        };
        let backend: Arc<dyn Backend> = match onnx {
            Some((model_file, output)) => {
                let graph = self.fetch(model_id, &model_file).await?;
                let inputs = manifest.inputs;
                Arc::new(blocking(model_id, move || TractBackend::new(inputs, output, &graph)).await?)
            }
            None => Arc::new(
                NativeBackend::new(manifest)
                    .map_err(|e| PredictionError::backend_unavailable(model_id, format!("{:#}", e)))?,
            ),
        };
        Ok((backend, checksum))
    }

    /// Read one artifact with the configured timeout and a single transient retry
    async fn fetch(&self, model_id: &str, location: &str) -> Result<Vec<u8>, PredictionError> {
        let mut retried = false;
        loop {
            let err = match tokio::time::timeout(self.config.load_timeout, self.loader.load(location)).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) => e,
                Err(_) => {
                    return Err(PredictionError::backend_unavailable(
                        model_id,
                        format!(
                            "loading '{}' timed out after {}ms",
                            location,
                            self.config.load_timeout.as_millis()
                        ),
                    ))
                }
            };

            if err.is_transient() && !retried {
                warn!(
                    model_id = %model_id,
                    location = %location,
                    error = %err,
                    backoff_ms = self.config.retry_backoff.as_millis() as u64,
                    "Transient artifact load failure, retrying"
                );
                retried = true;
                tokio::time::sleep(self.config.retry_backoff).await;
                continue;
            }
            return Err(PredictionError::backend_unavailable(model_id, err.to_string()));
        }
    }
}

async fn blocking<T, F>(model_id: &str, f: F) -> Result<T, PredictionError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PredictionError::backend_unavailable(model_id, format!("loader task failed: {}", e)))?
        .map_err(|e| PredictionError::backend_unavailable(model_id, format!("{:#}", e)))
}

/// Stock model ids
pub mod model_ids {
    pub const RANDOM_FOREST: &str = "Random Forest";
    pub const KERNEL_RIDGE: &str = "Kernel Ridge Regression";
    pub const XGBOOST: &str = "XGBoost";
    pub const CNN: &str = "CNN (Degradation Curve)";
    pub const HYBRID: &str = "Hybrid ML + DL";
}

/// Descriptors of the stock models, artifacts relative to the models directory
pub fn default_descriptors() -> Vec<ModelDescriptor> {
    use columns::*;

    let static_fields: Vec<String> = [
        COMPOSITION,
        ETL,
        HTL,
        THICKNESS,
        BAND_GAP,
        ENCAPSULATION,
        TEMPERATURE,
        HUMIDITY,
        LIGHT_INTENSITY,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let mut tabular_fields = static_fields.clone();
    tabular_fields.push(EXPOSURE_TIME.to_string());

    let random_forest = ModelDescriptor::tabular(model_ids::RANDOM_FOREST, tabular_fields.clone(), "random_forest.json");
    let kernel_ridge = ModelDescriptor::tabular(model_ids::KERNEL_RIDGE, tabular_fields.clone(), "kernel_ridge.json");
    let xgboost = ModelDescriptor::tabular(model_ids::XGBOOST, tabular_fields, "xgboost.json");
    let cnn = ModelDescriptor::sequence_curve(model_ids::CNN, static_fields, EXPOSURE_TIME, "cnn_degradation.json");
    let hybrid = ModelDescriptor::ensemble(model_ids::HYBRID, &random_forest, &cnn, 0.5);

    vec![random_forest, kernel_ridge, xgboost, cnn, hybrid]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LINEAR: &str = r#"{
        "schema_version": 1,
        "inputs": ["x"],
        "model": {"kind": "linear", "intercept": 0.0, "coefficients": [1.0]}
    }"#;

    const CURVE: &str = r#"{
        "schema_version": 1,
        "inputs": ["x"],
        "model": {
            "kind": "degradation_curve",
            "steps": 5,
            "tau_head": {"intercept": 6.0, "coefficients": [0.0]},
            "beta_head": {"intercept": 0.0, "coefficients": [0.0]}
        }
    }"#;

    /// Counts loads; the first `transient_failures` calls fail transiently
    /// and the first `fatal_failures` after those fail fatally
    struct CountingLoader {
        inner: StaticArtifactLoader,
        calls: AtomicUsize,
        transient_failures: usize,
        fatal_failures: usize,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(inner: StaticArtifactLoader) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
                transient_failures: 0,
                fatal_failures: 0,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ArtifactLoader for CountingLoader {
        async fn load(&self, location: &str) -> Result<Vec<u8>, LoadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.transient_failures {
                return Err(LoadError::Transient(anyhow::anyhow!("connection reset")));
            }
            if call < self.transient_failures + self.fatal_failures {
                return Err(LoadError::Fatal(anyhow::anyhow!("permission denied")));
            }
            self.inner.load(location).await
        }
    }

    fn artifacts() -> StaticArtifactLoader {
        StaticArtifactLoader::new()
            .with("linear.json", LINEAR)
            .with("curve.json", CURVE)
    }

    fn fast_config() -> RegistryConfig {
        RegistryConfig {
            load_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn tabular() -> ModelDescriptor {
        ModelDescriptor::tabular("lin", vec!["x".into()], "linear.json")
    }

    fn sequence() -> ModelDescriptor {
        ModelDescriptor::sequence_curve("curve", vec!["x".into()], "t", "curve.json")
    }

    fn registry(loader: Arc<dyn ArtifactLoader>) -> ModelRegistry {
        let (tab, seq) = (tabular(), sequence());
        let hybrid = ModelDescriptor::ensemble("hybrid", &tab, &seq, 0.5);
        ModelRegistry::builder()
            .register(tab)
            .register(seq)
            .register(hybrid)
            .register(ModelDescriptor::tabular("broken", vec!["x".into()], "missing.json"))
            .shared_loader(loader)
            .config(fast_config())
            .build()
            .unwrap()
    }

    fn features() -> FeatureVector {
        FeatureVector {
            columns: vec!["x".into()],
            values: vec![0.5],
            horizon_hours: Some(100.0),
        }
    }

    #[tokio::test]
    async fn test_unknown_model_is_unavailable() {
        let registry = registry(Arc::new(artifacts()));
        let err = registry.get_backend("Transformer").await.err().unwrap();
        assert_eq!(
            err,
            PredictionError::backend_unavailable("Transformer", "model is not registered")
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_other_models() {
        let registry = registry(Arc::new(artifacts()));

        assert!(registry.get_backend("broken").await.is_err());
        let backend = registry.get_backend("lin").await.unwrap();
        assert_eq!(backend.kind(), BackendKind::Tabular);
        assert!(backend.predict(&features()).is_ok());

        let status = registry.status();
        let state = |id: &str| status.iter().find(|s| s.model_id == id).unwrap().state.clone();
        assert!(matches!(state("broken"), BackendState::Unavailable { .. }));
        assert!(matches!(state("lin"), BackendState::Ready { checksum: Some(_), .. }));
        assert_eq!(state("curve"), BackendState::NotLoaded);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_load_once() {
        let mut loader = CountingLoader::new(artifacts());
        loader.delay = Duration::from_millis(20);
        let loader = Arc::new(loader);
        let registry = Arc::new(registry(loader.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_backend("lin").await })
            })
            .collect();

        let mut backends = Vec::new();
        for handle in handles {
            backends.push(handle.await.unwrap().unwrap());
        }
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(backends.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let mut loader = CountingLoader::new(artifacts());
        loader.transient_failures = 1;
        let loader = Arc::new(loader);
        let registry = registry(loader.clone());

        assert!(registry.get_backend("lin").await.is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_gives_up() {
        let mut loader = CountingLoader::new(artifacts());
        loader.transient_failures = 2;
        let loader = Arc::new(loader);
        let registry = registry(loader.clone());

        let err = registry.get_backend("lin").await.err().unwrap();
        assert!(matches!(err, PredictionError::BackendUnavailable { .. }));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut loader = CountingLoader::new(artifacts());
        loader.fatal_failures = 1;
        let registry = registry(Arc::new(loader));

        assert!(registry.get_backend("lin").await.is_err());
        assert!(registry.get_backend("lin").await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_load_leaves_cache_usable() {
        let mut loader = CountingLoader::new(artifacts());
        loader.delay = Duration::from_millis(200);
        let loader = Arc::new(loader);
        let registry = registry(loader.clone());

        let abandoned = tokio::time::timeout(Duration::from_millis(20), registry.get_backend("lin")).await;
        assert!(abandoned.is_err());

        let status = registry.status();
        let lin = status.iter().find(|s| s.model_id == "lin").unwrap();
        assert_eq!(lin.state, BackendState::NotLoaded);

        let backend = registry.get_backend("lin").await.unwrap();
        assert!(backend.predict(&features()).is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_load_times_out() {
        let mut loader = CountingLoader::new(artifacts());
        loader.delay = Duration::from_millis(500);
        let registry = ModelRegistry::builder()
            .register(tabular())
            .loader(loader)
            .config(RegistryConfig {
                load_timeout: Duration::from_millis(20),
                retry_backoff: Duration::from_millis(1),
            })
            .build()
            .unwrap();

        match registry.get_backend("lin").await {
            Err(PredictionError::BackendUnavailable { cause, .. }) => assert!(cause.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_ensemble_shares_member_cache() {
        let loader = Arc::new(CountingLoader::new(artifacts()));
        let registry = registry(loader.clone());

        let lin = registry.get_backend("lin").await.unwrap();
        let hybrid = registry.get_backend("hybrid").await.unwrap();
        assert_eq!(hybrid.kind(), BackendKind::Ensemble);
        // one read each for linear.json and curve.json
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&lin, &registry.get_backend("lin").await.unwrap()));

        let curve = registry.get_backend("curve").await.unwrap();
        assert_eq!(curve.kind(), BackendKind::SequenceCurve);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_incompatible_artifact_rejected() {
        let loader = StaticArtifactLoader::new().with("linear.json", CURVE);
        let registry = ModelRegistry::builder()
            .register(tabular())
            .loader(loader)
            .build()
            .unwrap();
        match registry.get_backend("lin").await {
            Err(PredictionError::BackendUnavailable { cause, .. }) => assert!(cause.contains("sequence-curve")),
            other => panic!("expected incompatible artifact, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fs_loader_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("linear.json"), LINEAR).unwrap();
        let loader = FsArtifactLoader::new(dir.path());

        assert!(loader.load("linear.json").await.is_ok());
        let err = loader.load("nope.json").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_builder_rejects_bad_descriptors() {
        let duplicate = ModelRegistry::builder()
            .register(tabular())
            .register(tabular())
            .loader(artifacts())
            .build();
        assert!(duplicate.is_err());

        let (tab, seq) = (tabular(), sequence());
        let orphan = ModelRegistry::builder()
            .register(ModelDescriptor::ensemble("hybrid", &tab, &seq, 0.5))
            .register(tab)
            .loader(artifacts())
            .build();
        assert!(orphan.is_err());

        let (tab, seq) = (tabular(), sequence());
        let swapped = ModelRegistry::builder()
            .register(ModelDescriptor::ensemble("hybrid", &seq, &tab, 0.5))
            .register(tab)
            .register(seq)
            .loader(artifacts())
            .build();
        assert!(swapped.is_err());

        assert!(ModelRegistry::builder().register(tabular()).build().is_err());
    }

    #[test]
    fn test_default_descriptors_register() {
        let registry = ModelRegistry::with_default_models(StaticArtifactLoader::new(), RegistryConfig::default()).unwrap();
        let ids: Vec<&str> = registry.model_ids().collect();
        assert_eq!(
            ids,
            vec![
                model_ids::RANDOM_FOREST,
                model_ids::KERNEL_RIDGE,
                model_ids::XGBOOST,
                model_ids::CNN,
                model_ids::HYBRID
            ]
        );
        let hybrid = registry.descriptor(model_ids::HYBRID).unwrap();
        assert_eq!(hybrid.required_features.len(), 10);
        assert_eq!(hybrid.time_axis.as_deref(), Some(columns::EXPOSURE_TIME));
    }
}
