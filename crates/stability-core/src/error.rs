//! Error taxonomy for schema derivation, validation and inference

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Non-fatal schema condition (the "schema degraded" case)
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SchemaWarning {
    #[error("field '{field}' has low signal ({reason}); using fallback range [0, 1]")]
    LowSignal { field: String, reason: String },
}

impl SchemaWarning {
    pub fn field(&self) -> &str {
        match self {
            SchemaWarning::LowSignal { field, .. } => field,
        }
    }
}

/// Rejection of a submitted parameter set
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("'{value}' is not an allowed value for '{field}'")]
    UnknownCategory { field: String, value: String },
    #[error("{value} is outside the range [{min}, {max}] for '{field}'")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{field}' expects {expected}, got '{value}'")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        value: String,
    },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            ValidationError::UnknownField(field)
            | ValidationError::UnknownCategory { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::TypeMismatch { field, .. } => field,
        }
    }
}

/// Failure raised by a backend during `predict`
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct InferenceError(pub String);

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure raised by an artifact loader
#[derive(Debug, Error)]
pub enum LoadError {
    /// Worth one retry (interrupted reads, timeouts on remote stores)
    #[error("transient load failure: {0:#}")]
    Transient(anyhow::Error),
    #[error("{0:#}")]
    Fatal(anyhow::Error),
}

impl LoadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::Transient(_))
    }
}

/// Any failure of a `run()` call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Internal invariant violation: the encoder saw a parameter set the validator should have completed
    #[error("required feature '{0}' missing after validation")]
    MissingFeature(String),
    #[error("model '{model_id}' is unavailable: {cause}")]
    BackendUnavailable { model_id: String, cause: String },
    #[error("inference failed for model '{model_id}': {cause}")]
    InferenceFailure { model_id: String, cause: String },
}

/// Stable machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownField,
    UnknownCategory,
    OutOfRange,
    TypeMismatch,
    MissingFeature,
    BackendUnavailable,
    InferenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::UnknownCategory => "unknown_category",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::MissingFeature => "missing_feature",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::InferenceFailure => "inference_failure",
        }
    }
}

/// Caller-facing error shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl PredictionError {
    pub fn backend_unavailable(model_id: &str, cause: impl Into<String>) -> Self {
        PredictionError::BackendUnavailable {
            model_id: model_id.to_string(),
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::Validation(ValidationError::UnknownField(_)) => ErrorKind::UnknownField,
            PredictionError::Validation(ValidationError::UnknownCategory { .. }) => {
                ErrorKind::UnknownCategory
            }
            PredictionError::Validation(ValidationError::OutOfRange { .. }) => ErrorKind::OutOfRange,
            PredictionError::Validation(ValidationError::TypeMismatch { .. }) => {
                ErrorKind::TypeMismatch
            }
            PredictionError::MissingFeature(_) => ErrorKind::MissingFeature,
            PredictionError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            PredictionError::InferenceFailure { .. } => ErrorKind::InferenceFailure,
        }
    }

    /// Field the error refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            PredictionError::Validation(e) => Some(e.field()),
            PredictionError::MissingFeature(name) => Some(name),
            PredictionError::BackendUnavailable { .. } | PredictionError::InferenceFailure { .. } => {
                None
            }
        }
    }

    /// Model id the error refers to, if any
    pub fn model_id(&self) -> Option<&str> {
        match self {
            PredictionError::BackendUnavailable { model_id, .. }
            | PredictionError::InferenceFailure { model_id, .. } => Some(model_id),
            _ => None,
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            error_kind: self.kind(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
        }
    }
}
