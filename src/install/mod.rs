//! Silent installation of downloaded programs.

pub mod executor;
pub mod flags;

pub use executor::{InstallExecutor, InstallFailure, InstallOutcome, INSTALL_TIMEOUT};
pub use flags::{install_command, is_known_installer, silent_flags};
