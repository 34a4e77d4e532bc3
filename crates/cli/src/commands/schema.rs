//! Schema inspection command

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use stability_core::schema::{build_schema, SchemaConfig};
use stability_core::{Dataset, Domain, FieldSpec, PipelineConfig};
use tabled::Tabled;

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    name: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Domain")]
    domain: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&FieldSpec> for FieldRow {
    fn from(spec: &FieldSpec) -> Self {
        let domain = match &spec.domain {
            Domain::Categorical { values } => values.join(", "),
            Domain::Continuous { min, max, .. } => format!("{} .. {}", min, max),
        };
        let kind = if spec.degraded {
            format!("{:?} (fallback)", spec.kind()).to_lowercase()
        } else {
            format!("{:?}", spec.kind()).to_lowercase()
        };
        Self {
            name: spec.name.clone(),
            label: spec.label.clone(),
            kind,
            domain,
            default: spec.default_value().to_string(),
        }
    }
}

/// Derive and print the input schema
///
/// Only the dataset is read; model artifacts are not touched.
pub fn show_schema(config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let dataset = Dataset::from_path(&config.dataset_path)
        .with_context(|| format!("Failed to read dataset {}", config.dataset_path.display()))?;
    let schema_config = SchemaConfig {
        continuous_threshold: config.continuous_threshold,
        ..SchemaConfig::default()
    };
    let build = build_schema(&dataset, &schema_config);

    match format {
        OutputFormat::Json => output::print_json(&build.schema.fields())?,
        OutputFormat::Table => {
            let (rows, columns) = dataset.shape();
            output::print_info(&format!(
                "{}: {} rows x {} columns ({} skipped)",
                config.dataset_path.display(),
                rows,
                columns,
                dataset.rows_skipped()
            ));
            output::print_table(build.schema.fields().iter().map(FieldRow::from).collect());
            for warning in &build.warnings {
                output::print_warning(&warning.to_string());
            }
        }
    }
    Ok(())
}
