// src/main.rs

use anyhow::Result;
use clap::Parser;
use pkgbridge::Config;
use pkgbridge::config::DEFAULT_CONFIG_PATH;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    match cli.command {
        Commands::Detect => commands::cmd_detect(&config).await,
        Commands::Refresh { force } => commands::cmd_refresh(&config, force).await,
        Commands::Check { packages, json } => commands::cmd_check(&config, &packages, json).await,
        Commands::Install { packages, yes } => commands::cmd_install(&config, &packages, yes).await,
    }
}
