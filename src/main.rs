//! Salvage - Main Entry Point

use clap::Parser;
use salvage::cli::{cmd_profile, cmd_run, cmd_validate, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salvage=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { data, out_dir, config } => {
            cmd_run(&data, &out_dir, config.as_deref())?;
        }
        Commands::Profile { data, config } => {
            cmd_profile(&data, config.as_deref())?;
        }
        Commands::Validate { data, config } => {
            cmd_validate(&data, config.as_deref())?;
        }
    }

    Ok(())
}
