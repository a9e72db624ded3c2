//! Bounded, classified installer runs.

use std::cell::Cell;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::flags::install_command;
use crate::error::ProvisionError;
use crate::probe::{Prerequisite, SystemProbe};
use crate::progress::ProgressSink;
use crate::shell::{program_name, ProcessRunner};

/// Default ceiling for one installer run.
pub const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Characters of installer stderr kept in a failure.
const STDERR_EXCERPT: usize = 200;

/// Why an installer run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum InstallFailure {
    /// The installer exited non-zero.
    NonZeroExit { code: Option<i32>, stderr: String },
    /// The installer was killed at its ceiling.
    Timeout { seconds: u64 },
    /// The installer could not be started.
    Launch { message: String },
}

impl InstallFailure {
    /// Convert into the crate error for `program`.
    pub fn into_error(self, program: &str) -> ProvisionError {
        match self {
            InstallFailure::NonZeroExit { code, .. } => ProvisionError::InstallNonZeroExit {
                program: program.to_string(),
                code,
            },
            InstallFailure::Timeout { seconds } => ProvisionError::InstallTimeout {
                program: program.to_string(),
                seconds,
            },
            InstallFailure::Launch { message } => ProvisionError::CommandFailed {
                command: program.to_string(),
                code: None,
                message,
            },
        }
    }
}

/// Result of one install request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum InstallOutcome {
    Skipped { reason: String },
    Succeeded,
    Failed(InstallFailure),
}

impl InstallOutcome {
    /// Whether the program is in place afterwards (installed or already there).
    pub fn is_ok(&self) -> bool {
        !matches!(self, InstallOutcome::Failed(_))
    }
}

/// Runs silent installers one at a time.
pub struct InstallExecutor<'a> {
    runner: &'a dyn ProcessRunner,
    probe: &'a dyn SystemProbe,
    sink: &'a dyn ProgressSink,
    timeout: Duration,
    runtime_installed_at: Cell<Option<Instant>>,
}

impl<'a> InstallExecutor<'a> {
    /// Create an executor with the default ceiling.
    pub fn new(
        runner: &'a dyn ProcessRunner,
        probe: &'a dyn SystemProbe,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            runner,
            probe,
            sink,
            timeout: INSTALL_TIMEOUT,
            runtime_installed_at: Cell::new(None),
        }
    }

    /// Override the per-installer ceiling.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Install `executable`, unless its program is already suitable and reachable.
    ///
    /// A suitable version that isn't reachable is installed over.
    pub fn install(&self, executable: &Path) -> InstallOutcome {
        let name = program_name(executable);

        if let Some(prerequisite) = Prerequisite::for_package(&name) {
            let state = self.probe.check(prerequisite);
            let version = state.detected_version.clone().unwrap_or_default();
            if state.is_satisfied() {
                tracing::info!("{} {} already installed, skipping {}", prerequisite, version, name);
                self.sink.detail(&format!(
                    "{} {} already installed, skipping",
                    prerequisite, version
                ));
                return InstallOutcome::Skipped {
                    reason: format!("{} {} already installed", prerequisite, version),
                };
            }
            if state.suitable_version_present {
                self.sink.detail(&format!(
                    "{} {} found but not reachable; installing again",
                    prerequisite, version
                ));
            }
        }

        let spec = install_command(executable, self.timeout);
        tracing::info!("Installing {}", spec.display());
        self.sink.detail(&format!("Installing {}, please wait...", name));

        let result = match self.runner.run(&spec) {
            Ok(result) => result,
            Err(e) => {
                self.sink.detail(&format!("Could not start {}", name));
                return self.fail(&name, InstallFailure::Launch {
                    message: e.to_string(),
                });
            }
        };

        if result.timed_out {
            self.sink.detail(&format!(
                "{} timed out after {}s",
                name,
                self.timeout.as_secs()
            ));
            return self.fail(&name, InstallFailure::Timeout {
                seconds: self.timeout.as_secs(),
            });
        }

        if !result.success {
            let stderr: String = result.stderr.trim().chars().take(STDERR_EXCERPT).collect();
            if !stderr.is_empty() {
                tracing::debug!("{} stderr: {}", name, stderr);
            }
            self.sink.detail(&format!(
                "{} failed with exit code {}",
                name,
                result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            ));
            return self.fail(&name, InstallFailure::NonZeroExit {
                code: result.exit_code,
                stderr,
            });
        }

        if Prerequisite::for_package(&name) == Some(Prerequisite::Runtime) {
            self.runtime_installed_at.set(Some(Instant::now()));
        }
        tracing::info!("{} installed in {:.1}s", name, result.duration.as_secs_f64());
        self.sink.detail(&format!("{} installed", name));
        InstallOutcome::Succeeded
    }

    fn fail(&self, name: &str, failure: InstallFailure) -> InstallOutcome {
        tracing::warn!("{}", failure.clone().into_error(name));
        InstallOutcome::Failed(failure)
    }

    /// When a runtime installer last completed successfully in this run.
    pub fn runtime_installed_at(&self) -> Option<Instant> {
        self.runtime_installed_at.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FixedProbe, PrerequisiteState};
    use crate::progress::RecordingSink;
    use crate::shell::{MockResponse, MockRunner};

    const RUNTIME: &str = "/downloads/python-3.11.9-amd64.exe";
    const MESSENGER: &str = "/downloads/WeChatSetup.exe";

    #[test]
    fn suitable_and_reachable_is_skipped() {
        let runner = MockRunner::new().on("python-3.11.9", MockResponse::ok(""));
        let probe = FixedProbe::new().with(
            Prerequisite::Runtime,
            PrerequisiteState::found("3.10.4", true, true),
        );
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink);

        let outcome = executor.install(Path::new(RUNTIME));

        assert!(matches!(outcome, InstallOutcome::Skipped { .. }));
        assert!(runner.calls().is_empty());
        assert_eq!(executor.runtime_installed_at(), None);
    }

    #[test]
    fn suitable_but_unreachable_still_installs() {
        let runner = MockRunner::new().on("python-3.11.9", MockResponse::ok(""));
        let probe = FixedProbe::new().with(
            Prerequisite::Runtime,
            PrerequisiteState::found("3.10", true, false),
        );
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink);

        let outcome = executor.install(Path::new(RUNTIME));

        assert_eq!(outcome, InstallOutcome::Succeeded);
        assert_eq!(runner.call_count("PrependPath=1"), 1);
        assert!(executor.runtime_installed_at().is_some());
        assert!(sink.has_detail("not reachable"));
    }

    #[test]
    fn messenger_install_does_not_mark_runtime() {
        let runner = MockRunner::new().on("WeChatSetup.exe /S", MockResponse::ok(""));
        let probe = FixedProbe::new();
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink);

        assert_eq!(executor.install(Path::new(MESSENGER)), InstallOutcome::Succeeded);
        assert_eq!(executor.runtime_installed_at(), None);
    }

    #[test]
    fn non_zero_exit_keeps_code_and_stderr_excerpt() {
        let long = "e".repeat(500);
        let runner = MockRunner::new().on("WeChatSetup", MockResponse::fail(1603, &long));
        let probe = FixedProbe::new();
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink);

        match executor.install(Path::new(MESSENGER)) {
            InstallOutcome::Failed(InstallFailure::NonZeroExit { code, stderr }) => {
                assert_eq!(code, Some(1603));
                assert_eq!(stderr.len(), STDERR_EXCERPT);
            }
            other => panic!("expected NonZeroExit, got {:?}", other),
        }
    }

    #[test]
    fn timeout_is_classified() {
        let runner = MockRunner::new().on("WeChatSetup", MockResponse::Timeout);
        let probe = FixedProbe::new();
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink)
            .with_timeout(Duration::from_secs(42));

        assert_eq!(
            executor.install(Path::new(MESSENGER)),
            InstallOutcome::Failed(InstallFailure::Timeout { seconds: 42 })
        );
    }

    #[test]
    fn launch_failure_is_classified() {
        let runner = MockRunner::new();
        let probe = FixedProbe::new();
        let sink = RecordingSink::new();
        let executor = InstallExecutor::new(&runner, &probe, &sink);

        match executor.install(Path::new("/downloads/other-setup.exe")) {
            InstallOutcome::Failed(InstallFailure::Launch { message }) => {
                assert!(message.contains("program not found"));
            }
            other => panic!("expected launch failure, got {:?}", other),
        }
    }

    #[test]
    fn failure_converts_to_error() {
        let err = InstallFailure::Timeout { seconds: 600 }.into_error("setup.exe");
        assert!(matches!(err, ProvisionError::InstallTimeout { seconds: 600, .. }));

        let err = InstallFailure::Launch {
            message: "permission denied".into(),
        }
        .into_error("setup.exe");
        assert!(err.to_string().contains("permission denied"));
    }
}
