//! Blood pressure prediction gateway CLI
//!
//! Sends samples to a running gateway for classification and BP
//! regression, checks its status, and fits or inspects scaler files
//! offline.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, predict, scaler};
use std::path::PathBuf;

/// Blood pressure prediction gateway CLI
#[derive(Parser)]
#[command(name = "bpg")]
#[command(author, version, about = "CLI for the Blood Pressure Prediction Gateway", long_about = None)]
pub struct Cli {
    /// Gateway URL (can also be set via BPG_API_URL env var)
    #[arg(long, env = "BPG_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify hypertension stage with the random forest
    Classify(predict::SampleArgs),

    /// Predict systolic BP with a confidence interval
    Systolic(predict::SampleArgs),

    /// Predict diastolic BP with a confidence interval
    Diastolic(predict::SampleArgs),

    /// Show gateway and model status
    Health,

    /// Fit or inspect scaler files
    #[command(subcommand)]
    Scaler(ScalerCommands),
}

#[derive(Subcommand)]
pub enum ScalerCommands {
    /// Fit a scaler from training records (JSON array of objects)
    Fit {
        /// Training records file
        input: PathBuf,

        /// Model the scaler is for
        #[arg(long, short, value_enum)]
        model: scaler::ScalerModel,

        /// Output scaler file
        #[arg(long, short)]
        output: PathBuf,
    },

    /// Show the parameters of a scaler file
    Inspect {
        /// Scaler file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify(args) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::classify(&client, &args, cli.format).await?;
        }
        Commands::Systolic(args) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::systolic(&client, &args, cli.format).await?;
        }
        Commands::Diastolic(args) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            predict::diastolic(&client, &args, cli.format).await?;
        }
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            health::show_health(&client, cli.format).await?;
        }
        Commands::Scaler(scaler_cmd) => match scaler_cmd {
            ScalerCommands::Fit { input, model, output } => {
                scaler::fit(&input, model, &output)?;
            }
            ScalerCommands::Inspect { path } => {
                scaler::inspect(&path, cli.format)?;
            }
        },
    }

    Ok(())
}
