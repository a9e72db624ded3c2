//! Error types for provisioning operations.
//!
//! This module defines [`ProvisionError`], the primary error type used
//! throughout the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Components return `ProvisionError` where a caller needs to tell failure
//!   kinds apart (corrupt archive vs. a single bad entry, timeout vs. exit code)
//! - Use `anyhow::Error` (via `ProvisionError::Other`) for unexpected errors
//! - The pipeline itself never returns an error: per-package failures are
//!   folded into typed outcomes in the run report

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Every download source for a package failed.
    #[error("All {attempts} source(s) failed for '{package}': {last_error}")]
    NetworkExhausted {
        package: String,
        attempts: usize,
        last_error: String,
    },

    /// A downloaded artifact did not match its declared checksum.
    #[error("Integrity check failed for {path}")]
    IntegrityMismatch { path: PathBuf },

    /// The archive could not be opened or enumerated at all.
    #[error("Archive is corrupt: {path}: {message}")]
    ArchiveCorrupt { path: PathBuf, message: String },

    /// A single archive entry failed to extract.
    #[error("Failed to extract '{entry}': {message}")]
    ArchiveEntryError { entry: String, message: String },

    /// An installer exited with a non-zero status.
    #[error("Installer '{program}' exited with code {code:?}")]
    InstallNonZeroExit { program: String, code: Option<i32> },

    /// An installer did not finish within its ceiling.
    #[error("Installer '{program}' timed out after {seconds}s")]
    InstallTimeout { program: String, seconds: u64 },

    /// A remote manifest source could not be fetched.
    #[error("Failed to fetch manifest from {url}: {message}")]
    ManifestFetchFailed { url: String, message: String },

    /// A manifest payload did not match the schema or its invariants.
    #[error("Failed to parse manifest from {source_name}: {message}")]
    ManifestParseFailed {
        source_name: String,
        message: String,
    },

    /// Settings file not found at an explicitly given location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse a settings file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Settings values that can't work together.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// A process could not be started.
    #[error("Command '{command}' failed: {message}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    /// The caller asked the pipeline to stop.
    #[error("Operation cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_exhausted_displays_package_and_attempts() {
        let err = ProvisionError::NetworkExhausted {
            package: "WeChatSetup.exe".into(),
            attempts: 3,
            last_error: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("WeChatSetup.exe"));
        assert!(msg.contains('3'));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn archive_corrupt_displays_path() {
        let err = ProvisionError::ArchiveCorrupt {
            path: PathBuf::from("/downloads/bundle.zip"),
            message: "invalid Zip archive".into(),
        };
        assert!(err.to_string().contains("/downloads/bundle.zip"));
    }

    #[test]
    fn archive_entry_error_displays_entry() {
        let err = ProvisionError::ArchiveEntryError {
            entry: "data/readme.txt".into(),
            message: "Invalid checksum".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("data/readme.txt"));
        assert!(msg.contains("Invalid checksum"));
    }

    #[test]
    fn install_errors_display_program() {
        let exit = ProvisionError::InstallNonZeroExit {
            program: "setup.exe".into(),
            code: Some(1603),
        };
        assert!(exit.to_string().contains("1603"));

        let timeout = ProvisionError::InstallTimeout {
            program: "setup.exe".into(),
            seconds: 600,
        };
        assert!(timeout.to_string().contains("600s"));
    }

    #[test]
    fn command_failed_displays_reason() {
        let err = ProvisionError::CommandFailed {
            command: "setup.exe /S".into(),
            code: None,
            message: "No such file or directory (os error 2)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("setup.exe /S"));
        assert!(msg.contains("os error 2"));
    }

    #[test]
    fn manifest_errors_display_source() {
        let err = ProvisionError::ManifestParseFailed {
            source_name: "https://example.com/cloud_config.json".into(),
            message: "missing field `packages`".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("example.com"));
        assert!(msg.contains("packages"));
    }

    #[test]
    fn config_errors_display_path_and_message() {
        let err = ProvisionError::ConfigParseError {
            path: PathBuf::from("/opt/app/hostprep.yml"),
            message: "invalid type".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("hostprep.yml"));
        assert!(msg.contains("invalid type"));

        let err = ProvisionError::ConfigValidationError {
            message: "readiness_min_secs exceeds readiness_max_secs".into(),
        };
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: ProvisionError = io_err.into();
        assert!(matches!(err, ProvisionError::Io(_)));
    }

    #[test]
    fn result_type_alias_works() {
        fn returns_error() -> Result<()> {
            Err(ProvisionError::Cancelled)
        }
        assert!(returns_error().is_err());
    }
}
