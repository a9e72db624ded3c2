//! hostprep - Provision a desktop host for a chat-bot project.
//!
//! hostprep reads a package manifest, downloads every package with mirror
//! fallback, verifies and unpacks what it fetched, installs the language
//! runtime and messenger client when they are missing, waits for the runtime
//! to come up, and finally starts the project's launch script.
//!
//! # Modules
//!
//! - [`archive`] - Zip expansion with path containment
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Settings file loading and validation
//! - [`error`] - Error types and result aliases
//! - [`fetch`] - Downloads with ordered fallback sources
//! - [`install`] - Silent installer execution
//! - [`launch`] - Launch script discovery and start-up
//! - [`manifest`] - Package manifest schema and persistence
//! - [`pipeline`] - The end-to-end provisioning run and its report
//! - [`probe`] - Prerequisite detection on the host
//! - [`progress`] - Progress events and sinks
//! - [`readiness`] - Waiting for a freshly installed runtime
//! - [`shell`] - Process execution and platform helpers
//! - [`ui`] - Terminal output, progress bars, and summaries
//! - [`verify`] - Checksum verification
//!
//! # Example
//!
//! ```
//! use hostprep::manifest::Manifest;
//!
//! let manifest = Manifest::from_json(
//!     r#"{"version":"1","packages":[{"name":"a.zip","url":"https://example.com/a.zip","size":0,"description":"","post_download":"extract"}]}"#,
//!     "example",
//! )
//! .unwrap();
//! assert!(manifest.get("a.zip").unwrap().should_extract());
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod install;
pub mod launch;
pub mod manifest;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod readiness;
pub mod shell;
pub mod ui;
pub mod verify;

pub use error::{ProvisionError, Result};
