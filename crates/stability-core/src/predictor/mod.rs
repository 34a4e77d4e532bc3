//! ML prediction engine

mod features;
mod inference;
mod output;
mod pipeline;
mod registry;


pub use features::{CategoricalEncoding, EncoderConfig, FeatureEncoder};
pub use inference::{
    parse_manifest, ArtifactManifest, CurveHead, EnsembleBackend, ModelSpec, OnnxOutput,
    NativeBackend, RegressionTree, TractBackend, ARTIFACT_SCHEMA_VERSION,
};
pub use output::{OutputConfig, OutputFormatter, T80_THRESHOLD};
pub use pipeline::{RunOptions, StabilityPipeline};
pub use registry::{
    default_descriptors, model_ids, ArtifactLoader, BackendState, BackendStatus, FsArtifactLoader,
    ModelRegistry, ModelRegistryBuilder, RegistryConfig, StaticArtifactLoader,
};

use crate::error::InferenceError;
use crate::models::{FeatureVector, RawPrediction};
use serde::{Deserialize, Serialize};

/// Trait for prediction backends
///
/// Implementations must not mutate shared state in `predict` beyond atomics:
/// one cached instance serves every concurrent caller.
pub trait Backend: Send + Sync {
    /// Run inference on an encoded feature vector
    fn predict(&self, features: &FeatureVector) -> Result<RawPrediction, InferenceError>;

    /// Kind of output this backend produces
    fn kind(&self) -> BackendKind;

    /// Encoded columns each underlying model reads, one slice per leaf model
    fn input_columns(&self) -> Vec<&[String]>;
}

/// Family of a registered model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Scalar regressor over static features
    Tabular,
    /// Degradation-curve generator over a time horizon
    SequenceCurve,
    /// Weighted combination of one tabular and one sequence-curve model
    Ensemble,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendKind::Tabular => "tabular",
            BackendKind::SequenceCurve => "sequence-curve",
            BackendKind::Ensemble => "ensemble",
        };
        write!(f, "{}", s)
    }
}

/// Members and weighting of a hybrid model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSpec {
    pub tabular: String,
    pub sequence: String,
    /// Weight of the tabular member in [0, 1]; the sequence member gets the rest
    pub tabular_weight: f64,
}

/// Registered model description, immutable once registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub backend_kind: BackendKind,
    /// Static input fields, in encoding order
    pub required_features: Vec<String>,
    /// Field encoded as the generation horizon instead of a static feature
    pub time_axis: Option<String>,
    /// Artifact location, relative to the loader root
    pub artifact: Option<String>,
    pub ensemble: Option<EnsembleSpec>,
}

impl ModelDescriptor {
    pub fn tabular(
        id: impl Into<String>,
        required_features: Vec<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            backend_kind: BackendKind::Tabular,
            required_features,
            time_axis: None,
            artifact: Some(artifact.into()),
            ensemble: None,
        }
    }

    pub fn sequence_curve(
        id: impl Into<String>,
        required_features: Vec<String>,
        time_axis: impl Into<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            backend_kind: BackendKind::SequenceCurve,
            required_features,
            time_axis: Some(time_axis.into()),
            artifact: Some(artifact.into()),
            ensemble: None,
        }
    }

    /// Hybrid over two registered members; features are the ordered union of theirs
    pub fn ensemble(
        id: impl Into<String>,
        tabular: &ModelDescriptor,
        sequence: &ModelDescriptor,
        tabular_weight: f64,
    ) -> Self {
        let mut required_features = tabular.required_features.clone();
        for feature in &sequence.required_features {
            if !required_features.contains(feature) {
                required_features.push(feature.clone());
            }
        }
        Self {
            id: id.into(),
            backend_kind: BackendKind::Ensemble,
            required_features,
            time_axis: sequence.time_axis.clone(),
            artifact: None,
            ensemble: Some(EnsembleSpec {
                tabular: tabular.id.clone(),
                sequence: sequence.id.clone(),
                tabular_weight,
            }),
        }
    }

    /// Every field the model reads, static features first
    pub fn input_fields(&self) -> impl Iterator<Item = &String> {
        self.required_features.iter().chain(self.time_axis.iter())
    }
}
