//! Perovskite Stability Predictor CLI
//!
//! A command-line tool for inspecting the derived input schema, checking
//! registered models and predicting device stability.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{models, predict, schema};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Perovskite Stability Predictor CLI
#[derive(Parser)]
#[command(name = "psp")]
#[command(author, version, about = "CLI for Perovskite Stability Predictor", long_about = None)]
pub struct Cli {
    /// CSV of experiment records the input schema is derived from
    #[arg(long, env = "PSP_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Directory holding model artifacts
    #[arg(long, env = "PSP_MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.config/psp/config.toml when present)
    #[arg(long, env = "PSP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the input fields derived from the dataset
    Schema,

    /// List registered models with load status and health
    Models {
        /// Load every model before reporting status
        #[arg(long)]
        load: bool,
    },

    /// Predict stability for one device
    Predict {
        /// Model to run
        #[arg(long, short, default_value = "Random Forest")]
        model: String,

        /// Parameter as FIELD=VALUE; repeat for each field
        #[arg(long = "param", short = 'p', value_name = "FIELD=VALUE")]
        params: Vec<String>,

        /// JSON file with a parameter object; --param values override it
        #[arg(long)]
        params_file: Option<PathBuf>,

        /// Clamp out-of-range values instead of rejecting them
        #[arg(long)]
        clamp: bool,

        /// Print Prometheus metrics after the prediction
        #[arg(long)]
        metrics: bool,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = config::resolve(&cli)?;

    match cli.command {
        Commands::Schema => {
            schema::show_schema(&config, cli.format)?;
        }
        Commands::Models { load } => {
            models::show_models(&config, load, cli.format).await?;
        }
        Commands::Predict {
            model,
            params,
            params_file,
            clamp,
            metrics,
        } => {
            let request = predict::PredictRequest {
                model,
                params,
                params_file,
                clamp,
                metrics,
            };
            return predict::run_prediction(&config, request, cli.format).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}
