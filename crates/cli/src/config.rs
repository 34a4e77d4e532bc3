//! Configuration resolution for the CLI

use crate::Cli;
use anyhow::{Context, Result};
use stability_core::PipelineConfig;
use std::path::{Path, PathBuf};

/// Merge the config file, `PSP_*` environment and command-line flags
///
/// Flags win over environment, environment over file.
pub fn resolve(cli: &Cli) -> Result<PipelineConfig> {
    let file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = PipelineConfig::load_from(file.as_deref())
        .with_context(|| match &file {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;
    apply_overrides(&mut config, cli.dataset.as_deref(), cli.models_dir.as_deref());
    Ok(config)
}

fn apply_overrides(config: &mut PipelineConfig, dataset: Option<&Path>, models_dir: Option<&Path>) {
    if let Some(dataset) = dataset {
        config.dataset_path = dataset.to_path_buf();
    }
    if let Some(models_dir) = models_dir {
        config.models_dir = models_dir.to_path_buf();
    }
}

/// Get the default configuration file path
fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("psp").join("config.toml"))
}
