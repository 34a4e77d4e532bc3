//! Input schema derived from the experiment dataset
//!
//! The schema describes every input field the form exposes: whether it is
//! categorical or continuous, which values are allowed, and its default.
//! It is derived once from a [`Dataset`](crate::dataset::Dataset) and then
//! shared read-only by the validator and the feature encoder.

mod registry;
mod validator;


pub use registry::{build_schema, SchemaBuild, FALLBACK_RANGE};
pub use validator::{validate, Notice, ValidatedParameters, ValidationOptions};

use crate::models::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Categorical,
    Continuous,
}

/// How a field's kind is decided when the schema is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindHint {
    /// Decide from the column contents
    #[default]
    Auto,
    Categorical,
    Continuous,
}

/// Allowed values of a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Domain {
    /// Sorted, de-duplicated, never empty
    Categorical { values: Vec<String> },
    Continuous { min: f64, max: f64, median: f64 },
}

/// Validated description of one input parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub domain: Domain,
    /// Set when the dataset yielded no usable values and the fallback range is in use
    pub degraded: bool,
}

impl FieldSpec {
    pub fn kind(&self) -> FieldKind {
        match self.domain {
            Domain::Categorical { .. } => FieldKind::Categorical,
            Domain::Continuous { .. } => FieldKind::Continuous,
        }
    }

    /// Value used when the caller leaves the field out
    pub fn default_value(&self) -> ParamValue {
        match &self.domain {
            Domain::Categorical { values } => values
                .first()
                .cloned()
                .map(ParamValue::Text)
                .unwrap_or(ParamValue::Number(FALLBACK_RANGE.2)),
            Domain::Continuous { median, .. } => ParamValue::Number(*median),
        }
    }
}

/// Column the schema reads and how to interpret it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub column: String,
    pub label: String,
    #[serde(default)]
    pub kind: KindHint,
}

impl FieldConfig {
    pub fn new(column: impl Into<String>, label: impl Into<String>, kind: KindHint) -> Self {
        Self {
            column: column.into(),
            label: label.into(),
            kind,
        }
    }
}

/// Which columns become fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub fields: Vec<FieldConfig>,
    /// Share of non-null values that must coerce for an `auto` field to be continuous
    pub continuous_threshold: f64,
}

/// Column names used by the default form
pub mod columns {
    pub const COMPOSITION: &str = "Perovskite_composition_short_form";
    pub const ETL: &str = "ETL_stack_sequence";
    pub const HTL: &str = "HTL_stack_sequence";
    pub const THICKNESS: &str = "Perovskite_thickness";
    pub const BAND_GAP: &str = "Perovskite_band_gap";
    pub const ENCAPSULATION: &str = "Encapsulation";
    pub const TEMPERATURE: &str = "Stability_temperature_range";
    pub const HUMIDITY: &str = "Stability_relative_humidity_range";
    pub const LIGHT_INTENSITY: &str = "Stability_light_intensity";
    pub const EXPOSURE_TIME: &str = "Stability_time_total_exposure";
}

impl Default for SchemaConfig {
    fn default() -> Self {
        use columns::*;
        Self {
            fields: vec![
                FieldConfig::new(COMPOSITION, "Perovskite Composition (short form)", KindHint::Categorical),
                FieldConfig::new(ETL, "Electron Transport Layer (ETL)", KindHint::Categorical),
                FieldConfig::new(HTL, "Hole Transport Layer (HTL)", KindHint::Categorical),
                FieldConfig::new(THICKNESS, "Perovskite Thickness (nm)", KindHint::Continuous),
                FieldConfig::new(BAND_GAP, "Perovskite Band Gap (eV)", KindHint::Continuous),
                FieldConfig::new(ENCAPSULATION, "Encapsulation", KindHint::Categorical),
                FieldConfig::new(TEMPERATURE, "Temperature (°C)", KindHint::Continuous),
                FieldConfig::new(HUMIDITY, "Relative Humidity (%)", KindHint::Continuous),
                FieldConfig::new(LIGHT_INTENSITY, "Light Intensity (W/m²)", KindHint::Continuous),
                FieldConfig::new(EXPOSURE_TIME, "Total Exposure Time (hours)", KindHint::Continuous),
            ],
            continuous_threshold: 1.0,
        }
    }
}

/// Ordered collection of field specs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    fields: Vec<FieldSpec>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self { fields, index }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Fields in configured order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn degraded_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.degraded)
    }
}
