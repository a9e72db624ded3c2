//! Process execution and platform helpers.

pub mod command;
pub mod mock;
pub mod platform;

pub use command::{
    execute_check, program_name, CommandResult, CommandSpec, ProcessRunner, SystemRunner,
};
pub use mock::{MockResponse, MockRunner};
pub use platform::{application_dir, elevation_hint, is_ci, is_elevated, reveal_command};
