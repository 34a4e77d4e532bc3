//! Model listing command

use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use stability_core::predictor::{BackendState, BackendStatus};
use stability_core::{ComponentStatus, PipelineConfig, PipelineHealth, StabilityPipeline};
use tabled::Tabled;

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model_id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Details")]
    details: String,
}

impl From<&BackendStatus> for ModelRow {
    fn from(status: &BackendStatus) -> Self {
        let (state, details) = match &status.state {
            BackendState::NotLoaded => ("not_loaded", String::new()),
            BackendState::Ready { checksum, loaded_at } => (
                "ready",
                match checksum {
                    Some(sum) => format!("sha256 {} at {}", &sum[..sum.len().min(12)], loaded_at.to_rfc3339()),
                    None => format!("loaded at {}", loaded_at.to_rfc3339()),
                },
            ),
            BackendState::Unavailable { cause, .. } => ("unavailable", cause.clone()),
        };
        Self {
            model_id: status.model_id.clone(),
            kind: status.backend_kind.to_string(),
            state: output::color_status(state),
            details,
        }
    }
}

#[derive(Serialize)]
struct ModelsReport {
    models: Vec<BackendStatus>,
    health: PipelineHealth,
}

/// List registered models, optionally loading each one first
pub async fn show_models(config: &PipelineConfig, load: bool, format: OutputFormat) -> Result<()> {
    let pipeline = StabilityPipeline::from_config(config)?;
    let registry = pipeline.registry();

    if load {
        let ids: Vec<String> = registry.model_ids().map(str::to_string).collect();
        for id in ids {
            // failures are recorded in the backend state
            if let Err(e) = registry.get_backend(&id).await {
                tracing::debug!(model_id = %id, error = %e, "Model failed to load");
            }
        }
    }

    let report = ModelsReport {
        models: registry.status(),
        health: pipeline.health(),
    };

    match format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => {
            output::print_table(report.models.iter().map(ModelRow::from).collect());
            println!();
            output::print_info(&format!(
                "Overall health: {}",
                output::color_status(&report.health.status.to_string())
            ));
            for (name, component) in &report.health.components {
                match (&component.message, component.status) {
                    (Some(message), status) if status != ComponentStatus::Healthy => {
                        output::print_warning(&format!("{}: {}", name, message));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}
