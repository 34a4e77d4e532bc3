//! Feature encoding for ML inference
//!
//! Turns a validated parameter set into the named numeric columns a backend
//! reads. Continuous fields are min-max scaled over their schema domain.
//! Categorical fields follow the columns the backend reads: `field=value`
//! inputs get one-hot indicators over the whole domain and a bare `field`
//! input gets the ordinal. Fields a backend does not declare fall back to the
//! size policy fixed when the encoder is built.

use super::{BackendKind, ModelDescriptor};
use crate::error::PredictionError;
use crate::models::{FeatureVector, ParamValue, ParameterSet};
use crate::schema::{Domain, FieldSpec, Schema};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

/// Encoding applied to a categorical field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalEncoding {
    /// One column per domain value, named `field=value`
    OneHot,
    /// Single column holding `index / (n - 1)`
    Ordinal,
}

/// Encoder settings
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Domains up to this size are one-hot encoded
    pub one_hot_max_categories: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            one_hot_max_categories: 16,
        }
    }
}

/// Encodes validated parameters for a specific model
pub struct FeatureEncoder {
    schema: Arc<Schema>,
    policies: HashMap<String, CategoricalEncoding>,
}

impl FeatureEncoder {
    pub fn new(schema: Arc<Schema>, config: &EncoderConfig) -> Self {
        let policies = schema
            .fields()
            .iter()
            .filter_map(|spec| match &spec.domain {
                Domain::Categorical { values } => {
                    let policy = if values.len() <= config.one_hot_max_categories {
                        CategoricalEncoding::OneHot
                    } else {
                        CategoricalEncoding::Ordinal
                    };
                    Some((spec.name.clone(), policy))
                }
                Domain::Continuous { .. } => None,
            })
            .collect();
        Self { schema, policies }
    }

    /// Encoding chosen for a categorical field
    pub fn policy(&self, field: &str) -> Option<CategoricalEncoding> {
        self.policies.get(field).copied()
    }

    /// Column names produced for a field, in order
    pub fn columns_for(&self, field: &str) -> Vec<String> {
        match self.schema.field(field).map(|s| &s.domain) {
            Some(Domain::Categorical { values })
                if self.policy(field) == Some(CategoricalEncoding::OneHot) =>
            {
                values.iter().map(|v| one_hot_column(field, v)).collect()
            }
            _ => vec![field.to_string()],
        }
    }

    /// Encode `params` in the order `model.required_features` declares
    ///
    /// `reads` holds the input columns of each leaf model behind the backend.
    pub fn encode(
        &self,
        params: &ParameterSet,
        model: &ModelDescriptor,
        reads: &[&[String]],
    ) -> Result<FeatureVector, PredictionError> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for field in &model.required_features {
            let (spec, value) = self.lookup(params, model, field)?;
            let forms = self.forms(field, reads);
            self.encode_field(spec, value, forms, &mut columns, &mut values)?;
        }

        let horizon_hours = match (model.backend_kind, &model.time_axis) {
            (BackendKind::SequenceCurve | BackendKind::Ensemble, Some(axis)) => {
                let (_, value) = self.lookup(params, model, axis)?;
                Some(value.as_number().ok_or_else(|| missing(model, axis))?)
            }
            _ => None,
        };

        Ok(FeatureVector {
            columns,
            values,
            horizon_hours,
        })
    }

    /// Categorical values no column of some leaf model represents
    ///
    /// A leaf reading `field=...` indicators but not `field=value` sees the
    /// submitted value as all zeros. One message per such field.
    pub fn unseen_categories(
        &self,
        params: &ParameterSet,
        model: &ModelDescriptor,
        reads: &[&[String]],
    ) -> Vec<String> {
        let mut unseen = Vec::new();
        for field in &model.required_features {
            let Some(text) = params.get(field).and_then(ParamValue::as_text) else {
                continue;
            };
            let prefix = format!("{}=", field);
            let column = one_hot_column(field, text);
            let missed = reads.iter().any(|leaf| {
                leaf.iter().any(|c| c.starts_with(&prefix)) && !leaf.iter().any(|c| *c == column)
            });
            if missed {
                unseen.push(format!(
                    "model '{}' was not trained on {} '{}'; it is encoded as no known category",
                    model.id, field, text
                ));
            }
        }
        unseen
    }

    /// Which encodings a categorical field needs: `(one_hot, ordinal)`
    fn forms(&self, field: &str, reads: &[&[String]]) -> (bool, bool) {
        let prefix = format!("{}=", field);
        let mut declared = reads.iter().flat_map(|leaf| leaf.iter());
        let one_hot = declared.clone().any(|c| c.starts_with(&prefix));
        let ordinal = declared.any(|c| c == field);
        if one_hot || ordinal {
            return (one_hot, ordinal);
        }
        match self.policy(field) {
            Some(CategoricalEncoding::OneHot) => (true, false),
            _ => (false, true),
        }
    }

    fn lookup<'a>(
        &'a self,
        params: &'a ParameterSet,
        model: &ModelDescriptor,
        field: &str,
    ) -> Result<(&'a FieldSpec, &'a ParamValue), PredictionError> {
        let spec = self.schema.field(field).ok_or_else(|| missing(model, field))?;
        let value = params.get(field).ok_or_else(|| missing(model, field))?;
        Ok((spec, value))
    }

    fn encode_field(
        &self,
        spec: &FieldSpec,
        value: &ParamValue,
        (one_hot, ordinal): (bool, bool),
        columns: &mut Vec<String>,
        values: &mut Vec<f64>,
    ) -> Result<(), PredictionError> {
        match (&spec.domain, value) {
            (Domain::Continuous { min, max, .. }, ParamValue::Number(n)) => {
                columns.push(spec.name.clone());
                values.push(scale(*n, *min, *max));
            }
            (Domain::Categorical { values: domain }, ParamValue::Text(text)) => {
                let index = domain
                    .iter()
                    .position(|v| v == text)
                    .ok_or_else(|| PredictionError::MissingFeature(spec.name.clone()))?;
                if one_hot {
                    for (i, v) in domain.iter().enumerate() {
                        columns.push(one_hot_column(&spec.name, v));
                        values.push(if i == index { 1.0 } else { 0.0 });
                    }
                }
                if ordinal {
                    columns.push(spec.name.clone());
                    values.push(ordinal_value(index, domain.len()));
                }
            }
            _ => {
                error!(field = %spec.name, "Unvalidated value reached the feature encoder");
                return Err(PredictionError::MissingFeature(spec.name.clone()));
            }
        }
        Ok(())
    }
}

fn missing(model: &ModelDescriptor, field: &str) -> PredictionError {
    error!(
        model_id = %model.id,
        field = %field,
        "Required feature missing after validation"
    );
    PredictionError::MissingFeature(field.to_string())
}

/// Column name of one one-hot indicator
pub(crate) fn one_hot_column(field: &str, value: &str) -> String {
    format!("{}={}", field, value)
}

fn scale(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if span.abs() < f64::EPSILON {
        return 0.0;
    }
    ((value - min) / span).clamp(0.0, 1.0)
}

fn ordinal_value(index: usize, n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else {
        index as f64 / (n - 1) as f64
    }
}
