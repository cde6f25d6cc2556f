//! tabcv - Main Entry Point
//!
//! Builds splits, trains and tunes tabular classifiers from the command line.

use clap::Parser;
use tabular_cv::cli::{cmd_optimize, cmd_split, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabular_cv=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Split(args) => cmd_split(&args)?,
        Commands::Train(args) => cmd_train(&args)?,
        Commands::Optimize(args) => cmd_optimize(&args)?,
    }

    Ok(())
}
