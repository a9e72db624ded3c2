//! Run command implementation.
//!
//! The `hostprep run` command provisions everything the manifest lists and
//! optionally starts the project afterwards.

use serde::Serialize;

use crate::cli::args::RunArgs;
use crate::config::Settings;
use crate::error::{ProvisionError, Result};
use crate::launch::{default_roots, LaunchOutcome, ScriptLauncher};
use crate::pipeline::{Provisioner, RunReport, RunStatus};
use crate::probe::{EmptyStore, HostProbe, RegQueryStore, SystemProbe, VersionStore};
use crate::progress::{ProgressSink, TracingSink};
use crate::shell::{ProcessRunner, SystemRunner};
use crate::ui::{show_launch, show_run_report, TerminalSink, UserInterface};

use super::dispatcher::{Command, CommandResult};

/// Run `f` with the real process runner and host probe.
pub(super) fn with_host<T>(f: impl FnOnce(&dyn ProcessRunner, &dyn SystemProbe) -> T) -> T {
    let runner = SystemRunner;
    let registry;
    let store: &dyn VersionStore = if cfg!(windows) {
        registry = RegQueryStore::new(&runner);
        &registry
    } else {
        &EmptyStore
    };
    let probe = HostProbe::new(&runner, store);
    f(&runner, &probe)
}

#[derive(Serialize)]
struct RunOutput<'a> {
    #[serde(flatten)]
    report: &'a RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    launch: Option<&'a LaunchOutcome>,
}

/// The run command implementation.
pub struct RunCommand {
    settings: Settings,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(settings: Settings, args: RunArgs) -> Self {
        Self { settings, args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Run against the given capabilities.
    pub(crate) fn run_with(
        &self,
        ui: &mut dyn UserInterface,
        runner: &dyn ProcessRunner,
        probe: &dyn SystemProbe,
    ) -> Result<CommandResult> {
        if !self.args.json {
            ui.show_header("hostprep");
        }

        let terminal;
        let sink: &dyn ProgressSink =
            if ui.is_interactive() && ui.output_mode().shows_progress() && !self.args.json {
                terminal = TerminalSink::new(ui.theme().clone());
                &terminal
            } else {
                &TracingSink
            };

        let mut provisioner = Provisioner::new(&self.settings, runner, probe, sink);
        if self.args.no_refresh {
            provisioner = provisioner.without_refresh();
        }
        let report = provisioner.run();

        let launch = if self.args.launch && report.status != RunStatus::Failed {
            let roots = default_roots(&self.settings.app_dir());
            Some(ScriptLauncher::new(runner, sink, &self.settings).find_and_launch(&roots))
        } else {
            None
        };

        if self.args.json {
            let output = RunOutput {
                report: &report,
                launch: launch.as_ref(),
            };
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| ProvisionError::Other(e.into()))?;
            ui.data(&json);
        } else {
            show_run_report(ui, &report);
            if let Some(outcome) = &launch {
                show_launch(ui, outcome);
            }
        }

        Ok(match report.status {
            RunStatus::Succeeded => CommandResult::success(),
            status => CommandResult::failure(status.exit_code()),
        })
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        with_host(|runner, probe| self.run_with(ui, runner, probe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FixedProbe, Prerequisite, PrerequisiteState};
    use crate::shell::{MockResponse, MockRunner};
    use crate::ui::MockUI;
    use httpmock::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn settings(app_dir: &Path) -> Settings {
        Settings {
            app_dir: Some(app_dir.to_path_buf()),
            request_timeout_secs: 5,
            launch_script: "run.bat".to_string(),
            ..Default::default()
        }
    }

    fn write_manifest(app_dir: &Path, url: &str) {
        let doc = serde_json::json!({
            "version": "2024.1",
            "packages": [{"name": "data.bin", "url": url, "size": 10, "description": "data"}],
        });
        fs::write(app_dir.join("cloud_config.json"), doc.to_string()).unwrap();
    }

    #[test]
    fn successful_run_exits_zero() {
        let temp = TempDir::new().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data.bin");
            then.status(200).body("0123456789");
        });
        write_manifest(temp.path(), &server.url("/data.bin"));
        let cmd = RunCommand::new(
            settings(temp.path()),
            RunArgs {
                no_refresh: true,
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();

        let result = cmd
            .run_with(&mut ui, &MockRunner::new(), &FixedProbe::new().elevated(true))
            .unwrap();

        assert_eq!(result, CommandResult::success());
        assert!(ui.has_success("data.bin"));
        assert!(ui.has_success("Provisioning complete"));
    }

    #[test]
    fn failed_run_exits_one() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "http://127.0.0.1:1/data.bin");
        let cmd = RunCommand::new(
            settings(temp.path()),
            RunArgs {
                no_refresh: true,
                launch: true,
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();
        let runner = MockRunner::new();

        let result = cmd
            .run_with(&mut ui, &runner, &FixedProbe::new().elevated(true))
            .unwrap();

        assert_eq!(result, CommandResult::failure(1));
        assert!(ui.has_error("Provisioning failed"));
        // No launch after a failed run.
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn json_output_includes_launch() {
        let temp = TempDir::new().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/data.bin");
            then.status(200).body("0123456789");
        });
        write_manifest(temp.path(), &server.url("/data.bin"));
        let script = temp.path().join("kourichat").join("run.bat");
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "echo").unwrap();
        let runner = MockRunner::new().on(
            &crate::launch::normal_command(&script).display(),
            MockResponse::ok(""),
        );
        let cmd = RunCommand::new(
            settings(temp.path()),
            RunArgs {
                no_refresh: true,
                launch: true,
                json: true,
            },
        );
        let mut ui = MockUI::new();
        let probe = FixedProbe::new()
            .elevated(true)
            .with(Prerequisite::Runtime, PrerequisiteState::found("3.11.9", true, true));

        let result = cmd.run_with(&mut ui, &runner, &probe).unwrap();

        assert!(result.success);
        assert!(ui.headers().is_empty());
        let json: serde_json::Value = serde_json::from_str(&ui.data_output()[0]).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["manifest_version"], "2024.1");
        assert_eq!(json["launch"]["outcome"], "normal");
    }
}
