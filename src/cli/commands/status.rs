//! Status command implementation.
//!
//! The `hostprep status` command shows the probe verdicts and which manifest
//! packages are already downloaded. It never downloads or installs.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::StatusArgs;
use crate::config::Settings;
use crate::error::{ProvisionError, Result};
use crate::manifest::{ManifestOrigin, ManifestStore};
use crate::pipeline::PrerequisiteReport;
use crate::probe::{Prerequisite, SystemProbe};
use crate::ui::{show_prerequisites, UserInterface};
use crate::verify;

use super::dispatcher::{Command, CommandResult};
use super::run::with_host;

/// Download state of one manifest package.
#[derive(Debug, Serialize)]
struct PackageStatus {
    name: String,
    description: String,
    path: PathBuf,
    present: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    app_dir: PathBuf,
    manifest_version: String,
    manifest_origin: ManifestOrigin,
    elevated: bool,
    prerequisites: Vec<PrerequisiteReport>,
    packages: Vec<PackageStatus>,
}

/// The status command implementation.
pub struct StatusCommand {
    settings: Settings,
    args: StatusArgs,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(settings: Settings, args: StatusArgs) -> Self {
        Self { settings, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &StatusArgs {
        &self.args
    }

    fn collect(&self, probe: &dyn SystemProbe) -> StatusReport {
        let store = ManifestStore::load(self.settings.manifest_path());
        let downloads_dir = self.settings.downloads_dir();

        let packages = store
            .manifest()
            .packages
            .iter()
            .map(|record| {
                let path = downloads_dir.join(&record.name);
                PackageStatus {
                    name: record.name.clone(),
                    description: record.description.clone(),
                    present: verify::verify(&path, &record.checksum),
                    path,
                }
            })
            .collect();

        StatusReport {
            app_dir: self.settings.app_dir(),
            manifest_version: store.manifest().version.clone(),
            manifest_origin: store.origin().clone(),
            elevated: probe.has_elevated_privileges(),
            prerequisites: Prerequisite::ALL
                .into_iter()
                .map(|prerequisite| PrerequisiteReport {
                    prerequisite,
                    state: probe.check(prerequisite),
                })
                .collect(),
            packages,
        }
    }

    /// Report against the given probe.
    pub(crate) fn status_with(
        &self,
        ui: &mut dyn UserInterface,
        probe: &dyn SystemProbe,
    ) -> Result<CommandResult> {
        let report = self.collect(probe);

        if self.args.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.data(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header("hostprep - Status");
        let theme = ui.theme().clone();
        ui.message(&theme.format_pair("Application", &report.app_dir.display().to_string()));
        ui.message(&theme.format_pair(
            "Manifest",
            &format!("{} ({})", report.manifest_version, report.manifest_origin),
        ));
        if !report.elevated {
            ui.warning("Not running with administrator privileges");
        }

        ui.message("");
        ui.message("Prerequisites:");
        show_prerequisites(ui, &report.prerequisites);

        ui.message("");
        ui.message("Packages:");
        for package in &report.packages {
            if package.present {
                ui.success(&format!("{}: downloaded", package.name));
            } else {
                ui.message(&theme.format_skipped(&format!("{}: not downloaded", package.name)));
            }
        }

        Ok(CommandResult::success())
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        with_host(|_, probe| self.status_with(ui, probe))
    }
}
