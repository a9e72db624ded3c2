//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::config::{load_settings, Settings};
use crate::error::Result;
use crate::shell::application_dir;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    settings: Settings,
}

impl CommandDispatcher {
    /// Create a dispatcher for already resolved settings.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Resolve settings from the command line, its environment fallbacks and
    /// the settings file.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let app_dir = cli.app_dir.clone().unwrap_or_else(application_dir);
        let mut settings = load_settings(cli.config.as_deref(), &app_dir)?;
        settings.apply_overrides(cli.app_dir.as_deref(), cli.manifest_url.as_deref());
        tracing::debug!("Resolved settings: {:?}", settings);
        Ok(Self::new(settings))
    }

    /// Get the resolved settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Some(Commands::Run(args)) => {
                super::run::RunCommand::new(self.settings.clone(), args.clone()).execute(ui)
            }
            Some(Commands::Status(args)) => {
                super::status::StatusCommand::new(self.settings.clone(), args.clone()).execute(ui)
            }
            Some(Commands::Refresh) => {
                super::refresh::RefreshCommand::new(self.settings.clone()).execute(ui)
            }
            // Default to run command with default args
            None => super::run::RunCommand::new(self.settings.clone(), RunArgs::default())
                .execute(ui),
        }
    }
}
