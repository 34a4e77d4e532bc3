//! Backend implementations and their artifact format
//!
//! Every artifact is a JSON manifest naming the feature columns the model was
//! trained on plus the model parameters. Tree ensembles, kernel ridge and
//! linear models are evaluated natively; ONNX graphs are run with tract.

use super::{Backend, BackendKind, ModelDescriptor};
use crate::error::InferenceError;
use crate::models::{FeatureVector, RawPrediction};
use crate::schema::{Domain, Schema};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Manifest layout version this build understands
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Shortest horizon a curve is generated over, in hours
const MIN_HORIZON_HOURS: f64 = 1.0;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Parsed artifact manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    /// Feature columns in the order the model reads them
    pub inputs: Vec<String>,
    pub model: ModelSpec,
}

/// Model parameters, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    /// RBF kernel ridge: `intercept + Σ dual_coef[i] · exp(-gamma · |x - sv[i]|²)`
    KernelRidge {
        gamma: f64,
        #[serde(default)]
        intercept: f64,
        dual_coef: Vec<f64>,
        support_vectors: Vec<Vec<f64>>,
    },
    /// Mean of regression trees
    RandomForest { trees: Vec<RegressionTree> },
    /// `base_score + learning_rate · Σ tree(x)`
    GradientBoosting {
        base_score: f64,
        learning_rate: f64,
        trees: Vec<RegressionTree>,
    },
    /// Stretched exponential decay `exp(-(t / tau)^beta)`
    DegradationCurve {
        steps: usize,
        /// Predicts `ln tau` in hours
        tau_head: CurveHead,
        /// Predicts the pre-activation of `beta`
        beta_head: CurveHead,
    },
    Onnx {
        /// Graph location, resolved by the same loader as the manifest
        model_file: String,
        output: OnnxOutput,
    },
}

/// What an ONNX graph emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnnxOutput {
    /// First output value is the regression target
    Scalar,
    /// Output values are retained fractions on an even grid over the horizon
    Curve,
}

/// Linear head used by the curve model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveHead {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl CurveHead {
    fn eval(&self, x: &[f64]) -> f64 {
        self.intercept + dot(&self.coefficients, x)
    }
}

/// Regression tree in sklearn's parallel-array layout
///
/// Leaves have a negative `feature`. Children always point to a later node,
/// which [`RegressionTree::check`] enforces so traversal terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub feature: Vec<i32>,
    pub threshold: Vec<f64>,
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn check(&self, n_inputs: usize) -> Result<()> {
        let n = self.feature.len();
        if n == 0 {
            anyhow::bail!("tree has no nodes");
        }
        if self.threshold.len() != n || self.left.len() != n || self.right.len() != n || self.value.len() != n {
            anyhow::bail!("tree node arrays have inconsistent lengths");
        }
        for i in 0..n {
            if self.feature[i] < 0 {
                continue;
            }
            if self.feature[i] as usize >= n_inputs {
                anyhow::bail!("node {} splits on feature {} of {}", i, self.feature[i], n_inputs);
            }
            for child in [self.left[i], self.right[i]] {
                if child <= i as i32 || child as usize >= n {
                    anyhow::bail!("node {} has invalid child {}", i, child);
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            let feature = self.feature[idx];
            if feature < 0 {
                return self.value[idx];
            }
            idx = if x[feature as usize] <= self.threshold[idx] {
                self.left[idx] as usize
            } else {
                self.right[idx] as usize
            };
        }
    }
}

impl ModelSpec {
    /// Backend family this model belongs to
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            ModelSpec::Linear { .. }
            | ModelSpec::KernelRidge { .. }
            | ModelSpec::RandomForest { .. }
            | ModelSpec::GradientBoosting { .. }
            | ModelSpec::Onnx {
                output: OnnxOutput::Scalar,
                ..
            } => BackendKind::Tabular,
            ModelSpec::DegradationCurve { .. }
            | ModelSpec::Onnx {
                output: OnnxOutput::Curve,
                ..
            } => BackendKind::SequenceCurve,
        }
    }

    fn check(&self, n_inputs: usize) -> Result<()> {
        match self {
            ModelSpec::Linear { coefficients, .. } => check_len("coefficients", coefficients.len(), n_inputs),
            ModelSpec::KernelRidge {
                gamma,
                dual_coef,
                support_vectors,
                ..
            } => {
                if *gamma <= 0.0 {
                    anyhow::bail!("gamma must be positive");
                }
                if dual_coef.len() != support_vectors.len() {
                    anyhow::bail!(
                        "{} dual coefficients for {} support vectors",
                        dual_coef.len(),
                        support_vectors.len()
                    );
                }
                support_vectors
                    .iter()
                    .try_for_each(|sv| check_len("support vector", sv.len(), n_inputs))
            }
            ModelSpec::RandomForest { trees } | ModelSpec::GradientBoosting { trees, .. } => {
                if trees.is_empty() {
                    anyhow::bail!("ensemble has no trees");
                }
                trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, t)| t.check(n_inputs).with_context(|| format!("tree {}", i)))
            }
            ModelSpec::DegradationCurve {
                steps,
                tau_head,
                beta_head,
            } => {
                if *steps < 2 {
                    anyhow::bail!("curve needs at least 2 steps");
                }
                check_len("tau_head coefficients", tau_head.coefficients.len(), n_inputs)?;
                check_len("beta_head coefficients", beta_head.coefficients.len(), n_inputs)
            }
            ModelSpec::Onnx { model_file, .. } => {
                if model_file.is_empty() {
                    anyhow::bail!("model_file is empty");
                }
                Ok(())
            }
        }
    }
}

fn check_len(what: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        anyhow::bail!("{} has {} values, expected {}", what, found, expected);
    }
    Ok(())
}

impl ArtifactManifest {
    /// Reject manifests this descriptor cannot feed
    pub fn check_compatible(&self, descriptor: &ModelDescriptor) -> Result<()> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            anyhow::bail!(
                "incompatible artifact schema version {} (expected {})",
                self.schema_version,
                ARTIFACT_SCHEMA_VERSION
            );
        }
        let kind = self.model.backend_kind();
        if kind != descriptor.backend_kind {
            anyhow::bail!("artifact is a {} model, descriptor expects {}", kind, descriptor.backend_kind);
        }
        for input in &self.inputs {
            let field = input.split('=').next().unwrap_or(input);
            if !descriptor.required_features.iter().any(|f| f == field) {
                anyhow::bail!("artifact input '{}' is not a feature of model '{}'", input, descriptor.id);
            }
        }
        Ok(())
    }

    /// Reject manifests whose indicator columns the schema can never produce
    ///
    /// A `field=value` input needs `field` to be categorical. Returns the
    /// indicator columns whose value is outside the field's domain; those
    /// always read as 0.
    pub fn check_encodable(&self, schema: &Schema) -> Result<Vec<String>> {
        let mut absent = Vec::new();
        for input in &self.inputs {
            let (field, value) = match input.split_once('=') {
                Some((field, value)) => (field, Some(value)),
                None => (input.as_str(), None),
            };
            let spec = schema
                .field(field)
                .with_context(|| format!("artifact input '{}' reads unknown field '{}'", input, field))?;
            match (&spec.domain, value) {
                (Domain::Continuous { .. }, Some(_)) => anyhow::bail!(
                    "artifact input '{}' is a category indicator but '{}' is continuous in the dataset",
                    input,
                    field
                ),
                (Domain::Categorical { values }, Some(value)) if !values.iter().any(|v| v == value) => {
                    absent.push(input.clone());
                }
                _ => {}
            }
        }
        Ok(absent)
    }
}

/// Parse and structurally check a manifest
pub fn parse_manifest(bytes: &[u8]) -> Result<ArtifactManifest> {
    let manifest: ArtifactManifest =
        serde_json::from_slice(bytes).context("Failed to parse artifact manifest")?;
    manifest
        .model
        .check(manifest.inputs.len())
        .context("Invalid model parameters")?;
    Ok(manifest)
}

/// Pull the artifact's input columns out of a feature vector
///
/// A one-hot column the vector lacks reads as 0: its category is outside the
/// schema domain, so no validated input can select it.
fn project(inputs: &[String], features: &FeatureVector) -> Result<Vec<f64>, InferenceError> {
    inputs
        .iter()
        .map(|name| match features.get(name) {
            Some(v) => Ok(v),
            None if name.contains('=') => Ok(0.0),
            None => Err(InferenceError::new(format!("input column '{}' not in feature vector", name))),
        })
        .collect()
}

fn horizon(features: &FeatureVector) -> Result<f64, InferenceError> {
    features
        .horizon_hours
        .map(|h| h.max(MIN_HORIZON_HOURS))
        .ok_or_else(|| InferenceError::new("curve backend requires a horizon"))
}

/// Even time grid over `[0, horizon]`
fn time_grid(horizon: f64, steps: usize) -> Vec<f64> {
    let last = (steps - 1).max(1) as f64;
    (0..steps).map(|i| horizon * i as f64 / last).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Backend evaluated in Rust from manifest parameters
pub struct NativeBackend {
    inputs: Vec<String>,
    model: ModelSpec,
}

impl NativeBackend {
    pub fn new(manifest: ArtifactManifest) -> Result<Self> {
        if matches!(manifest.model, ModelSpec::Onnx { .. }) {
            anyhow::bail!("ONNX manifests are served by the tract backend");
        }
        manifest.model.check(manifest.inputs.len())?;
        Ok(Self {
            inputs: manifest.inputs,
            model: manifest.model,
        })
    }
}

impl Backend for NativeBackend {
    fn predict(&self, features: &FeatureVector) -> Result<RawPrediction, InferenceError> {
        let x = project(&self.inputs, features)?;

        let prediction = match &self.model {
            ModelSpec::Linear {
                intercept,
                coefficients,
            } => RawPrediction::Scalar {
                value: intercept + dot(coefficients, &x),
                spread: None,
            },
            ModelSpec::KernelRidge {
                gamma,
                intercept,
                dual_coef,
                support_vectors,
            } => {
                let value = support_vectors
                    .iter()
                    .zip(dual_coef)
                    .map(|(sv, alpha)| {
                        let dist2: f64 = sv.iter().zip(&x).map(|(a, b)| (a - b).powi(2)).sum();
                        alpha * (-gamma * dist2).exp()
                    })
                    .sum::<f64>()
                    + intercept;
                RawPrediction::Scalar { value, spread: None }
            }
            ModelSpec::RandomForest { trees } => {
                let outputs: Vec<f64> = trees.iter().map(|t| t.predict(&x)).collect();
                let n = outputs.len() as f64;
                let mean = outputs.iter().sum::<f64>() / n;
                let spread = (outputs.len() > 1).then(|| {
                    (outputs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
                });
                RawPrediction::Scalar { value: mean, spread }
            }
            ModelSpec::GradientBoosting {
                base_score,
                learning_rate,
                trees,
            } => RawPrediction::Scalar {
                value: base_score + learning_rate * trees.iter().map(|t| t.predict(&x)).sum::<f64>(),
                spread: None,
            },
            ModelSpec::DegradationCurve {
                steps,
                tau_head,
                beta_head,
            } => {
                let horizon = horizon(features)?;
                let tau = tau_head.eval(&x).exp();
                let beta = 0.3 + 1.7 * sigmoid(beta_head.eval(&x));
                if !tau.is_finite() || tau <= 0.0 {
                    return Err(InferenceError::new(format!("curve time constant {} is not usable", tau)));
                }
                let times_hours = time_grid(horizon, *steps);
                let retained = times_hours
                    .iter()
                    .map(|t| (-(t / tau).powf(beta)).exp())
                    .collect();
                RawPrediction::Curve {
                    times_hours,
                    retained,
                }
            }
            ModelSpec::Onnx { .. } => {
                return Err(InferenceError::new("ONNX model reached the native backend"));
            }
        };

        if let RawPrediction::Scalar { value, .. } = prediction {
            if !value.is_finite() {
                return Err(InferenceError::new("model produced a non-finite value"));
            }
        }
        Ok(prediction)
    }

    fn kind(&self) -> BackendKind {
        self.model.backend_kind()
    }
    fn input_columns(&self) -> Vec<&[String]> {
        vec![self.inputs.as_slice()]
    }
}

/// ONNX-based backend using tract for lightweight inference
pub struct TractBackend {
    inputs: Vec<String>,
    output: OnnxOutput,
    model: TractModel,
}

impl TractBackend {
    /// Load and optimize an ONNX graph from bytes
    pub fn new(inputs: Vec<String>, output: OnnxOutput, model_bytes: &[u8]) -> Result<Self> {
        let width = Self::width(inputs.len(), output);
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, width]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(Self {
            inputs,
            output,
            model,
        })
    }

    /// Curve graphs take the horizon as one extra trailing input
    fn width(n_inputs: usize, output: OnnxOutput) -> usize {
        match output {
            OnnxOutput::Scalar => n_inputs,
            OnnxOutput::Curve => n_inputs + 1,
        }
    }

    fn run(&self, data: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
        let width = data.len();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, width), data)
            .map_err(|e| InferenceError::new(format!("Failed to build input tensor: {}", e)))?
            .into();
        let result = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::new(format!("ONNX inference failed: {}", e)))?;
        let output = result
            .first()
            .ok_or_else(|| InferenceError::new("No output from model"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::new(format!("Unexpected output tensor: {}", e)))?;
        Ok(view.iter().copied().collect())
    }
}

impl Backend for TractBackend {
    fn predict(&self, features: &FeatureVector) -> Result<RawPrediction, InferenceError> {
        let mut data: Vec<f32> = project(&self.inputs, features)?
            .into_iter()
            .map(|v| v as f32)
            .collect();

        match self.output {
            OnnxOutput::Scalar => {
                let values = self.run(data)?;
                let value = *values
                    .first()
                    .ok_or_else(|| InferenceError::new("Model output is empty"))?;
                Ok(RawPrediction::Scalar {
                    value: value as f64,
                    spread: None,
                })
            }
            OnnxOutput::Curve => {
                let horizon = horizon(features)?;
                data.push(horizon as f32);
                let values = self.run(data)?;
                if values.len() < 2 {
                    return Err(InferenceError::new(format!(
                        "Curve output has {} values, expected at least 2",
                        values.len()
                    )));
                }
                Ok(RawPrediction::Curve {
                    times_hours: time_grid(horizon, values.len()),
                    retained: values.into_iter().map(f64::from).collect(),
                })
            }
        }
    }

    fn kind(&self) -> BackendKind {
        match self.output {
            OnnxOutput::Scalar => BackendKind::Tabular,
            OnnxOutput::Curve => BackendKind::SequenceCurve,
        }
    }

    fn input_columns(&self) -> Vec<&[String]> {
        vec![self.inputs.as_slice()]
    }
}

/// Hybrid backend running one tabular and one sequence-curve member
pub struct EnsembleBackend {
    tabular: Arc<dyn Backend>,
    sequence: Arc<dyn Backend>,
    tabular_weight: f64,
}

impl EnsembleBackend {
    pub fn new(tabular: Arc<dyn Backend>, sequence: Arc<dyn Backend>, tabular_weight: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&tabular_weight) {
            anyhow::bail!("tabular weight {} outside [0, 1]", tabular_weight);
        }
        if tabular.kind() != BackendKind::Tabular || sequence.kind() != BackendKind::SequenceCurve {
            anyhow::bail!("ensemble members must be one tabular and one sequence-curve backend");
        }
        Ok(Self {
            tabular,
            sequence,
            tabular_weight,
        })
    }
}

impl Backend for EnsembleBackend {
    fn predict(&self, features: &FeatureVector) -> Result<RawPrediction, InferenceError> {
        let tabular = self
            .tabular
            .predict(features)
            .map_err(|e| InferenceError::new(format!("tabular member: {}", e)))?;
        let sequence = self
            .sequence
            .predict(features)
            .map_err(|e| InferenceError::new(format!("sequence member: {}", e)))?;
        Ok(RawPrediction::Blend {
            tabular_weight: self.tabular_weight,
            tabular: Box::new(tabular),
            sequence: Box::new(sequence),
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ensemble
    }

    fn input_columns(&self) -> Vec<&[String]> {
        let mut columns = self.tabular.input_columns();
        columns.extend(self.sequence.input_columns());
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(columns: &[&str], values: &[f64], horizon: Option<f64>) -> FeatureVector {
        FeatureVector {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            values: values.to_vec(),
            horizon_hours: horizon,
        }
    }

    fn stump(threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            feature: vec![0, -2, -2],
            threshold: vec![threshold, 0.0, 0.0],
            left: vec![1, -1, -1],
            right: vec![2, -1, -1],
            value: vec![0.0, low, high],
        }
    }

    fn manifest(inputs: &[&str], model: ModelSpec) -> ArtifactManifest {
        ArtifactManifest {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            inputs: inputs.iter().map(|c| c.to_string()).collect(),
            model,
        }
    }

    #[test]
    fn test_linear_with_missing_one_hot_column() {
        let backend = NativeBackend::new(manifest(
            &["x", "Encapsulation=Glass"],
            ModelSpec::Linear {
                intercept: 0.5,
                coefficients: vec![2.0, 1.0],
            },
        ))
        .unwrap();
        let out = backend.predict(&features(&["x"], &[0.25], None)).unwrap();
        assert_eq!(out, RawPrediction::Scalar { value: 1.0, spread: None });
    }

    #[test]
    fn test_missing_static_column_fails() {
        let backend = NativeBackend::new(manifest(
            &["x"],
            ModelSpec::Linear {
                intercept: 0.0,
                coefficients: vec![1.0],
            },
        ))
        .unwrap();
        assert!(backend.predict(&features(&["y"], &[1.0], None)).is_err());
    }

    #[test]
    fn test_forest_mean_and_spread() {
        let backend = NativeBackend::new(manifest(
            &["x"],
            ModelSpec::RandomForest {
                trees: vec![stump(0.5, 1.0, 3.0), stump(0.2, 0.0, 1.0)],
            },
        ))
        .unwrap();
        let out = backend.predict(&features(&["x"], &[0.4], None)).unwrap();
        // first tree goes left (1.0), second goes right (1.0)
        assert_eq!(out, RawPrediction::Scalar { value: 1.0, spread: Some(0.0) });

        let out = backend.predict(&features(&["x"], &[0.9], None)).unwrap();
        match out {
            RawPrediction::Scalar { value, spread } => {
                assert!((value - 2.0).abs() < 1e-12);
                assert!((spread.unwrap() - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_boosting_sum() {
        let backend = NativeBackend::new(manifest(
            &["x"],
            ModelSpec::GradientBoosting {
                base_score: 0.5,
                learning_rate: 0.1,
                trees: vec![stump(0.5, -1.0, 1.0), stump(0.5, -2.0, 2.0)],
            },
        ))
        .unwrap();
        match backend.predict(&features(&["x"], &[0.9], None)).unwrap() {
            RawPrediction::Scalar { value, .. } => assert!((value - 0.8).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_kernel_ridge_at_support_vector() {
        let backend = NativeBackend::new(manifest(
            &["x", "y"],
            ModelSpec::KernelRidge {
                gamma: 1.0,
                intercept: 0.1,
                dual_coef: vec![2.0],
                support_vectors: vec![vec![0.5, 0.5]],
            },
        ))
        .unwrap();
        match backend.predict(&features(&["x", "y"], &[0.5, 0.5], None)).unwrap() {
            RawPrediction::Scalar { value, .. } => assert!((value - 2.1).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_curve_decays_over_horizon() {
        let backend = NativeBackend::new(manifest(
            &["x"],
            ModelSpec::DegradationCurve {
                steps: 11,
                tau_head: CurveHead {
                    intercept: 1000f64.ln(),
                    coefficients: vec![0.0],
                },
                beta_head: CurveHead {
                    intercept: 0.0,
                    coefficients: vec![0.0],
                },
            },
        ))
        .unwrap();
        assert_eq!(backend.kind(), BackendKind::SequenceCurve);

        match backend.predict(&features(&["x"], &[0.3], Some(2000.0))).unwrap() {
            RawPrediction::Curve {
                times_hours,
                retained,
            } => {
                assert_eq!(times_hours.len(), 11);
                assert_eq!(times_hours[10], 2000.0);
                assert_eq!(retained[0], 1.0);
                assert!(retained.windows(2).all(|w| w[1] <= w[0]));
                // beta = 1.15, at t = tau retained = e^-1
                assert!((retained[5] - (-1.0f64).exp()).abs() < 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(backend.predict(&features(&["x"], &[0.3], None)).is_err());
    }

    #[test]
    fn test_tree_with_backward_child_rejected() {
        let mut tree = stump(0.5, 0.0, 1.0);
        tree.left[0] = 0;
        let result = NativeBackend::new(manifest(&["x"], ModelSpec::RandomForest { trees: vec![tree] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_manifest_compatibility() {
        let descriptor = ModelDescriptor::tabular("rf", vec!["x".into(), "Encapsulation".into()], "rf.json");
        let ok = manifest(
            &["x", "Encapsulation=Glass"],
            ModelSpec::Linear {
                intercept: 0.0,
                coefficients: vec![1.0, 1.0],
            },
        );
        assert!(ok.check_compatible(&descriptor).is_ok());

        let mut wrong_version = ok.clone();
        wrong_version.schema_version = 2;
        assert!(wrong_version.check_compatible(&descriptor).is_err());

        let unknown_input = manifest(
            &["z"],
            ModelSpec::Linear {
                intercept: 0.0,
                coefficients: vec![1.0],
            },
        );
        assert!(unknown_input.check_compatible(&descriptor).is_err());
    }

    #[test]
    fn test_parse_manifest_json() {
        let json = br#"{
            "schema_version": 1,
            "inputs": ["x"],
            "model": {"kind": "linear", "intercept": 0.0, "coefficients": [1.0]}
        }"#;
        let manifest = parse_manifest(json).unwrap();
        assert_eq!(manifest.model.backend_kind(), BackendKind::Tabular);

        let bad = br#"{"schema_version": 1, "inputs": ["x"], "model": {"kind": "linear", "intercept": 0.0, "coefficients": []}}"#;
        assert!(parse_manifest(bad).is_err());
    }

    #[test]
    fn test_invalid_onnx_bytes_rejected() {
        assert!(TractBackend::new(vec!["x".into()], OnnxOutput::Scalar, b"not a model").is_err());
    }

    #[test]
    fn test_ensemble_requires_matching_members() {
        let tabular: Arc<dyn Backend> = Arc::new(
            NativeBackend::new(manifest(
                &["x"],
                ModelSpec::Linear {
                    intercept: 0.0,
                    coefficients: vec![1.0],
                },
            ))
            .unwrap(),
        );
        assert!(EnsembleBackend::new(tabular.clone(), tabular.clone(), 0.5).is_err());
    }
}
