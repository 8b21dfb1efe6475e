//! Kolosal Forecast - Main Entry Point
//!
//! Prepares windowed forecasting datasets from the command line.

use clap::Parser;
use kolosal_forecast::cli::{cmd_evaluate, cmd_info, cmd_prepare, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare { pipeline, output, report } => {
            cmd_prepare(&pipeline, output.as_deref(), report.as_deref())?;
        }
        Commands::Evaluate { pipeline } => {
            cmd_evaluate(&pipeline)?;
        }
        Commands::Info { data, timestamp_column, delimiter } => {
            cmd_info(&data, &timestamp_column, delimiter)?;
        }
    }

    Ok(())
}
