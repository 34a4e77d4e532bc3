//! Prediction command

use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use stability_core::observability::PipelineMetrics;
use stability_core::{ParamValue, ParameterSet, PipelineConfig, PredictionReport, RunOptions, StabilityPipeline};
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::Tabled;

/// Arguments of one `predict` invocation
pub struct PredictRequest {
    pub model: String,
    pub params: Vec<String>,
    pub params_file: Option<PathBuf>,
    pub clamp: bool,
    pub metrics: bool,
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Stability Score")]
    score: String,
    #[tabled(rename = "T80 Lifetime")]
    lifetime: String,
    #[tabled(rename = "Uncertainty")]
    uncertainty: String,
}

impl From<&PredictionReport> for ResultRow {
    fn from(report: &PredictionReport) -> Self {
        Self {
            model: report.model_id.clone(),
            score: output::color_score(report.stability_score),
            lifetime: output::format_hours(report.estimated_lifetime_t80_hours),
            uncertainty: report
                .uncertainty
                .map(|u| format!("±{:.4}", u))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Split `FIELD=VALUE` at the first `=`
///
/// Values stay textual; the validator coerces them for continuous fields.
fn parse_param(raw: &str) -> Result<(String, ParamValue)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid parameter '{}': expected FIELD=VALUE", raw))?;
    let field = field.trim();
    if field.is_empty() {
        anyhow::bail!("Invalid parameter '{}': field name is empty", raw);
    }
    Ok((field.to_string(), ParamValue::Text(value.trim().to_string())))
}

fn collect_params(request: &PredictRequest) -> Result<ParameterSet> {
    let mut params = match &request.params_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ParameterSet>(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => ParameterSet::new(),
    };
    for raw in &request.params {
        let (field, value) = parse_param(raw)?;
        params.insert(field, value);
    }
    Ok(params)
}

/// Run one prediction and print the report
///
/// Prediction errors are printed and mapped to exit code 2; setup errors
/// propagate.
pub async fn run_prediction(
    config: &PipelineConfig,
    request: PredictRequest,
    format: OutputFormat,
) -> Result<ExitCode> {
    let params = collect_params(&request)?;
    let pipeline = StabilityPipeline::from_config(config)?;
    let options = RunOptions { clamp: request.clamp };

    let outcome = pipeline.run(&params, &request.model, options).await;

    let code = match outcome {
        Ok(report) => {
            match format {
                OutputFormat::Json => output::print_json(&report)?,
                OutputFormat::Table => {
                    output::print_table(vec![ResultRow::from(&report)]);
                    for warning in &report.warnings {
                        output::print_warning(warning);
                    }
                    for notice in &report.notices {
                        output::print_info(notice);
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            match format {
                OutputFormat::Json => output::print_json(&e.to_report())?,
                OutputFormat::Table => output::print_error(&format!("[{}] {}", e.kind().as_str(), e)),
            }
            ExitCode::from(2)
        }
    };

    if request.metrics {
        print!("{}", PipelineMetrics::new().render()?);
    }
    Ok(code)
}
