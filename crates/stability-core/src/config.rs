//! Pipeline configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// CSV of experiment records the schema is derived from
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory model artifacts are loaded from
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Upper bound on a single backend load
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Delay before retrying a transient load failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Categorical fields with at most this many values are one-hot encoded
    #[serde(default = "default_one_hot_max_categories")]
    pub one_hot_max_categories: usize,

    /// Share of non-null values that must parse for an auto field to be continuous
    #[serde(default = "default_continuous_threshold")]
    pub continuous_threshold: f64,

    /// T80 of a backend scoring exactly 0.5, in hours
    #[serde(default = "default_lifetime_scale_hours")]
    pub lifetime_scale_hours: f64,

    /// Cap on reported T80, in hours
    #[serde(default = "default_max_lifetime_hours")]
    pub max_lifetime_hours: f64,

    /// Inference latency above which a warning is logged
    #[serde(default = "default_slow_inference_ms")]
    pub slow_inference_ms: u64,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("Perovskite_database_content_all_data.csv")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_one_hot_max_categories() -> usize {
    16
}

fn default_continuous_threshold() -> f64 {
    1.0
}

fn default_lifetime_scale_hours() -> f64 {
    1000.0
}

fn default_max_lifetime_hours() -> f64 {
    100_000.0
}

fn default_slow_inference_ms() -> u64 {
    5
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            models_dir: default_models_dir(),
            load_timeout_ms: default_load_timeout_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            one_hot_max_categories: default_one_hot_max_categories(),
            continuous_threshold: default_continuous_threshold(),
            lifetime_scale_hours: default_lifetime_scale_hours(),
            max_lifetime_hours: default_max_lifetime_hours(),
            slow_inference_ms: default_slow_inference_ms(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment only
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file, overridden by `PSP_*` environment variables
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("PSP"))
            .build()
            .context("Failed to read configuration")?;

        let parsed: Self = config
            .try_deserialize()
            .context("Failed to parse configuration")?;
        parsed.check()?;
        Ok(parsed)
    }

    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.continuous_threshold) {
            anyhow::bail!(
                "continuous_threshold must be within [0, 1], got {}",
                self.continuous_threshold
            );
        }
        if self.lifetime_scale_hours <= 0.0 || self.max_lifetime_hours <= 0.0 {
            anyhow::bail!("lifetime settings must be positive");
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
