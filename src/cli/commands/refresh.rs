//! Refresh command implementation.
//!
//! The `hostprep refresh` command replaces the local manifest with the first
//! well-formed remote copy, keeping a backup of the previous one.

use crate::config::Settings;
use crate::error::Result;
use crate::manifest::ManifestStore;
use crate::progress::TracingSink;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// The refresh command implementation.
pub struct RefreshCommand {
    settings: Settings,
}

impl RefreshCommand {
    /// Create a new refresh command.
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl Command for RefreshCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let urls = &self.settings.manifest_urls;
        if urls.is_empty() {
            ui.warning("No remote manifest URLs configured (set manifest_urls or --manifest-url)");
            return Ok(CommandResult::failure(1));
        }

        let mut store = ManifestStore::load(self.settings.manifest_path())
            .with_timeout(self.settings.manifest_timeout());
        let previous = store.manifest().version.clone();

        if store.refresh_from_remote(urls, &TracingSink) {
            ui.success(&format!(
                "Manifest updated from {} to {} ({} packages)",
                previous,
                store.manifest().version,
                store.manifest().len()
            ));
            ui.message(&format!(
                "Previous manifest saved to {}",
                store.backup_path().display()
            ));
            Ok(CommandResult::success())
        } else {
            ui.error(&format!(
                "All manifest sources failed; keeping version {}",
                previous
            ));
            Ok(CommandResult::failure(1))
        }
    }
}
