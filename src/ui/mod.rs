//! User interface components.
//!
//! This module provides:
//! - [`UserInterface`] trait for UI abstraction
//! - [`TerminalUI`] for terminal usage and [`MockUI`] for tests
//! - [`TerminalSink`], an `indicatif` progress display
//! - Summary rendering for run reports
//!
//! # Example
//!
//! ```
//! use hostprep::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.show_header("hostprep");
//! ui.success("Provisioning complete");
//! assert_eq!(ui.headers(), ["hostprep"]);
//! ```

pub mod mock;
pub mod output;
pub mod progress;
pub mod summary;
pub mod terminal;
pub mod theme;

pub use mock::MockUI;
pub use output::OutputMode;
pub use progress::{format_bytes, format_duration, TerminalSink};
pub use summary::{show_launch, show_prerequisites, show_run_report};
pub use terminal::{create_ui, TerminalUI};
pub use theme::{should_use_colors, Theme};

/// Trait for user interface interactions.
///
/// This trait allows mocking the UI in tests.
pub trait UserInterface {
    /// Get the current output mode.
    fn output_mode(&self) -> OutputMode;

    /// Display an informational message (hidden in quiet mode).
    fn message(&mut self, msg: &str);

    /// Display a success message.
    fn success(&mut self, msg: &str);

    /// Display a warning message.
    fn warning(&mut self, msg: &str);

    /// Display an error message.
    fn error(&mut self, msg: &str);

    /// Show a header/banner.
    fn show_header(&mut self, title: &str);

    /// Write machine-readable output, whatever the mode.
    fn data(&mut self, text: &str);

    /// Whether a person is watching (progress bars make sense).
    fn is_interactive(&self) -> bool;

    /// Styles for composing lines.
    fn theme(&self) -> &Theme;
}
