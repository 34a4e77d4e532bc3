//! Parameter validation against the schema
//!
//! Validation is pure: it reads the schema and the submitted values and
//! produces either a complete parameter set or the first field-level error.

use super::{registry::coerce_numeric, Domain, FieldSpec, Schema};
use crate::error::ValidationError;
use crate::models::{ParamValue, ParameterSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-selected validation behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Clamp out-of-range continuous values instead of rejecting them
    pub clamp: bool,
}

/// Non-fatal adjustment made during validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    Clamped {
        field: String,
        original: f64,
        clamped: f64,
    },
    Defaulted {
        field: String,
        value: ParamValue,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Clamped {
                field,
                original,
                clamped,
            } => write!(f, "'{}' clamped from {} to {}", field, original, clamped),
            Notice::Defaulted { field, value } => {
                write!(f, "'{}' not supplied, using default {}", field, value)
            }
        }
    }
}

/// A parameter set with every schema field present and in-domain
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedParameters {
    pub params: ParameterSet,
    pub notices: Vec<Notice>,
}

/// Check `params` against `schema`, filling defaults for absent fields
pub fn validate(
    params: &ParameterSet,
    schema: &Schema,
    options: ValidationOptions,
) -> Result<ValidatedParameters, ValidationError> {
    if let Some((unknown, _)) = params.iter().find(|(name, _)| schema.field(name).is_none()) {
        return Err(ValidationError::UnknownField(unknown.clone()));
    }

    let mut validated = ParameterSet::new();
    let mut notices = Vec::new();

    for spec in schema.fields() {
        let value = match params.get(&spec.name) {
            Some(value) => check_value(spec, value, options, &mut notices)?,
            None => {
                let value = spec.default_value();
                notices.push(Notice::Defaulted {
                    field: spec.name.clone(),
                    value: value.clone(),
                });
                value
            }
        };
        validated.insert(spec.name.clone(), value);
    }

    Ok(ValidatedParameters {
        params: validated,
        notices,
    })
}

fn check_value(
    spec: &FieldSpec,
    value: &ParamValue,
    options: ValidationOptions,
    notices: &mut Vec<Notice>,
) -> Result<ParamValue, ValidationError> {
    match &spec.domain {
        Domain::Categorical { values } => {
            let text = value.as_text().ok_or_else(|| ValidationError::TypeMismatch {
                field: spec.name.clone(),
                expected: "a category name",
                value: value.to_string(),
            })?;
            if values.iter().any(|v| v == text) {
                Ok(value.clone())
            } else {
                Err(ValidationError::UnknownCategory {
                    field: spec.name.clone(),
                    value: text.to_string(),
                })
            }
        }
        Domain::Continuous { min, max, .. } => {
            let number = match value {
                ParamValue::Number(n) if n.is_finite() => Some(*n),
                ParamValue::Number(_) => None,
                ParamValue::Text(s) => coerce_numeric(s),
            }
            .ok_or_else(|| ValidationError::TypeMismatch {
                field: spec.name.clone(),
                expected: "a finite number",
                value: value.to_string(),
            })?;

            if (*min..=*max).contains(&number) {
                return Ok(ParamValue::Number(number));
            }
            if !options.clamp {
                return Err(ValidationError::OutOfRange {
                    field: spec.name.clone(),
                    value: number,
                    min: *min,
                    max: *max,
                });
            }
            let clamped = number.clamp(*min, *max);
            notices.push(Notice::Clamped {
                field: spec.name.clone(),
                original: number,
                clamped,
            });
            Ok(ParamValue::Number(clamped))
        }
    }
}
