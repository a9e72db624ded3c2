//! Output verbosity.

/// Output verbosity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Progress bars, detail lines and the summary.
    #[default]
    Normal,
    /// Summary and errors only.
    Quiet,
}

impl OutputMode {
    /// Check if this mode shows progress bars and detail lines.
    pub fn shows_progress(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Check if this mode shows informational messages.
    pub fn shows_status(&self) -> bool {
        matches!(self, Self::Normal)
    }
}
