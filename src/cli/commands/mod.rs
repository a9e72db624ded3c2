//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! Commands are dispatched via [`CommandDispatcher`], which resolves settings
//! once and routes CLI subcommands to their implementations.

pub mod dispatcher;
pub mod refresh;
pub mod run;
pub mod status;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
