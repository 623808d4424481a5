//! Prediction Gateway CLI
//!
//! A command-line tool for issuing prediction requests against a running
//! gateway and inspecting its health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{predict, status};

/// Prediction Gateway CLI
#[derive(Parser)]
#[command(name = "pgw")]
#[command(author, version, about = "CLI for the Prediction Gateway", long_about = None)]
pub struct Cli {
    /// Gateway URL (can also be set via PGW_API_URL env var)
    #[arg(long, env = "PGW_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Request a prediction
    Predict {
        /// Subject ticker symbols (e.g. AAPL MSFT)
        #[arg(required = true)]
        subjects: Vec<String>,

        /// Query text or type tag (e.g. "payout_rating")
        #[arg(long, short)]
        query: String,

        /// Additional parameters as key=value pairs
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Show gateway health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Predict {
            subjects,
            query,
            params,
        } => {
            predict::run(&client, subjects, &query, &params, cli.format).await?;
        }
        Commands::Status => {
            status::run(&client, cli.format).await?;
        }
    }

    Ok(())
}
