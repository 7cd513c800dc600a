//! Autisense - Main Entry Point

use clap::Parser;
use autisense::cli::{cmd_compare, cmd_info, cmd_inspect, cmd_predict, cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autisense=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, config, output, report, no_tune } => {
            cmd_train(&data, config.as_deref(), &output, report.as_deref(), no_tune)?;
        }
        Commands::Compare { data, config } => {
            cmd_compare(&data, config.as_deref())?;
        }
        Commands::Predict { artifact, input, sample, interactive } => {
            cmd_predict(&artifact, input.as_deref(), sample, interactive)?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Inspect { artifact } => {
            cmd_inspect(&artifact)?;
        }
        Commands::Serve { artifact, port, host } => {
            cmd_serve(artifact, host, port).await?;
        }
    }

    Ok(())
}
