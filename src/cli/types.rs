//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::{run::RunArgs, snapshot::SnapshotArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(about = "Conductor - phase-gated session orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .conductor/config.yaml + local.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a request through its phases with the dry-run executor
    Run(RunArgs),

    /// Check traceability of labels against tagged files
    Validate(ValidateArgs),

    /// Inspect saved session snapshots
    Snapshot(SnapshotArgs),
}
