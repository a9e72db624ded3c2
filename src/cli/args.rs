//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hostprep - Download, verify and install an application's prerequisites.
#[derive(Debug, Parser)]
#[command(name = "hostprep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Application directory (defaults to the executable's directory)
    #[arg(short, long, global = true, env = "HOSTPREP_APP_DIR")]
    pub app_dir: Option<PathBuf>,

    /// Path to settings file (overrides <app-dir>/hostprep.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote manifest URL, tried before any configured in settings
    #[arg(long, global = true, env = "HOSTPREP_MANIFEST_URL")]
    pub manifest_url: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Provision prerequisites (default if no command specified)
    Run(RunArgs),

    /// Show detected prerequisites and downloaded packages
    Status(StatusArgs),

    /// Refresh the manifest from its remote sources
    Refresh,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Use the local manifest without checking remote sources
    #[arg(long)]
    pub no_refresh: bool,

    /// Start the project's launch script afterwards
    #[arg(long)]
    pub launch: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Print status as JSON
    #[arg(long)]
    pub json: bool,
}
