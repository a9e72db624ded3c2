//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures all
//! interactions for later assertion.
//!
//! # Example
//!
//! ```
//! use hostprep::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.message("Starting");
//! ui.success("Done!");
//!
//! assert!(ui.messages().contains(&"Starting".to_string()));
//! assert!(ui.has_success("Done"));
//! ```

use super::{OutputMode, Theme, UserInterface};

/// Captures UI interactions.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    interactive: bool,
    theme: Theme,
    messages: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    headers: Vec<String>,
    data: Vec<String>,
}

impl MockUI {
    /// Create a non-interactive MockUI with Normal output mode and no colors.
    pub fn new() -> Self {
        Self {
            theme: Theme::plain(),
            ..Default::default()
        }
    }

    /// Create a MockUI with a specific output mode.
    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Self::new()
        }
    }

    /// Set whether this mock behaves as interactive.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Machine-readable output, in order.
    pub fn data_output(&self) -> &[String] {
        &self.data
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }

    pub fn has_success(&self, needle: &str) -> bool {
        self.successes.iter().any(|m| m.contains(needle))
    }

    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings.iter().any(|m| m.contains(needle))
    }

    pub fn has_error(&self, needle: &str) -> bool {
        self.errors.iter().any(|m| m.contains(needle))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn show_header(&mut self, title: &str) {
        self.headers.push(title.to_string());
    }

    fn data(&mut self, text: &str) {
        self.data.push(text.to_string());
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn theme(&self) -> &Theme {
        &self.theme
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_by_level() {
        let mut ui = MockUI::new();
        ui.message("m");
        ui.success("s");
        ui.warning("w");
        ui.error("e");
        ui.show_header("h");
        ui.data("{}");

        assert_eq!(ui.messages(), ["m"]);
        assert_eq!(ui.successes(), ["s"]);
        assert_eq!(ui.warnings(), ["w"]);
        assert_eq!(ui.errors(), ["e"]);
        assert_eq!(ui.headers(), ["h"]);
        assert_eq!(ui.data_output(), ["{}"]);
    }

    #[test]
    fn defaults_to_non_interactive_normal() {
        let ui = MockUI::new();
        assert!(!ui.is_interactive());
        assert_eq!(ui.output_mode(), OutputMode::Normal);
    }
}
