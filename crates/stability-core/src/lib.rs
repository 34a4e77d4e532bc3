//! Core library for perovskite solar cell stability prediction
//!
//! This crate provides:
//! - Schema derivation from a CSV of experiment records
//! - Validation and encoding of device parameters
//! - A registry of lazily loaded model backends
//! - The prediction pipeline tying them together
//! - Health checks and observability

pub mod config;
pub mod dataset;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod schema;

pub use config::PipelineConfig;
pub use dataset::Dataset;
pub use error::{ErrorKind, ErrorReport, InferenceError, LoadError, PredictionError, SchemaWarning, ValidationError};
pub use health::{ComponentHealth, ComponentStatus, PipelineHealth};
pub use models::*;
pub use observability::{PipelineLogger, PipelineMetrics};
pub use predictor::{Backend, BackendKind, ModelDescriptor, ModelRegistry, RunOptions, StabilityPipeline};
pub use schema::{Domain, FieldKind, FieldSpec, Schema, SchemaConfig};
