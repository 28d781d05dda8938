//! Conductor CLI entry point.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use conductor::cli::{Cli, Commands};
use conductor::infrastructure::config::ConfigLoader;
use conductor::infrastructure::logging::{prune_expired_logs, LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration");
    let config = match config {
        Ok(config) => config,
        Err(err) => conductor::cli::handle_error(err, cli.json),
    };

    let log_config = LogConfig::from(&config.logging);
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => logger,
        Err(err) => conductor::cli::handle_error(err, cli.json),
    };
    if let Some(dir) = &log_config.log_dir {
        if let Err(err) = prune_expired_logs(dir, log_config.retention_days, Utc::now()).await {
            tracing::warn!(error = %err, "log retention cleanup failed");
        }
    }

    let result = match cli.command {
        Commands::Run(args) => conductor::cli::commands::run::execute(args, config, cli.json).await,
        Commands::Validate(args) => {
            conductor::cli::commands::validate::execute(args, config, cli.json).await
        }
        Commands::Snapshot(args) => conductor::cli::commands::snapshot::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        conductor::cli::handle_error(err, cli.json);
    }
}
