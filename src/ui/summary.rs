//! Human-readable rendering of run results.

use super::progress::{format_bytes, format_duration};
use super::UserInterface;
use crate::fetch::{AcquireFailure, AcquisitionResult, SkipReason};
use crate::install::{InstallFailure, InstallOutcome};
use crate::launch::LaunchOutcome;
use crate::pipeline::{ExtractionOutcome, PackageReport, PrerequisiteReport, RunReport, RunStatus};

/// One line describing how a package was acquired.
pub fn acquisition_line(result: &AcquisitionResult) -> String {
    match result {
        AcquisitionResult::Acquired {
            bytes, attempts, ..
        } if *attempts > 1 => format!(
            "downloaded {} (after {} sources)",
            format_bytes(*bytes),
            attempts
        ),
        AcquisitionResult::Acquired { bytes, .. } => format!("downloaded {}", format_bytes(*bytes)),
        AcquisitionResult::Skipped(SkipReason::AlreadyPresent { .. }) => {
            "already downloaded".to_string()
        }
        AcquisitionResult::Skipped(SkipReason::PrerequisiteSatisfied { version }) => {
            match version {
                Some(v) => format!("{} already installed", v),
                None => "already installed".to_string(),
            }
        }
        AcquisitionResult::Failed(AcquireFailure::NetworkExhausted {
            attempts,
            last_error,
        }) => format!("all {} sources failed ({})", attempts, last_error),
        AcquisitionResult::Failed(AcquireFailure::IntegrityMismatch) => {
            "checksum mismatch".to_string()
        }
        AcquisitionResult::Failed(AcquireFailure::Cancelled) => "cancelled".to_string(),
    }
}

/// One line describing an installer run.
pub fn install_line(outcome: &InstallOutcome) -> String {
    match outcome {
        InstallOutcome::Skipped { reason } => reason.clone(),
        InstallOutcome::Succeeded => "installed".to_string(),
        InstallOutcome::Failed(InstallFailure::NonZeroExit { code, .. }) => match code {
            Some(code) => format!("installer exited with {}", code),
            None => "installer was terminated".to_string(),
        },
        InstallOutcome::Failed(InstallFailure::Timeout { seconds }) => {
            format!("installer timed out after {}s", seconds)
        }
        InstallOutcome::Failed(InstallFailure::Launch { message }) => {
            format!("installer could not start: {}", message)
        }
    }
}

fn show_package(ui: &mut dyn UserInterface, package: &PackageReport) {
    let mut line = format!("{}: {}", package.name, acquisition_line(&package.acquisition));
    match &package.extraction {
        Some(ExtractionOutcome::Expanded(summary)) if summary.failed.is_empty() => {
            line.push_str(&format!(", extracted {} entries", summary.extracted));
        }
        Some(ExtractionOutcome::Expanded(summary)) => line.push_str(&format!(
            ", extracted {}/{} entries",
            summary.extracted, summary.total_entries
        )),
        Some(ExtractionOutcome::Failed { message }) => {
            line.push_str(&format!(", extraction failed: {}", message))
        }
        None => {}
    }
    if let Some(install) = &package.install {
        line.push_str(&format!(", {}", install_line(install)));
    }

    if package.has_failure() {
        ui.warning(&line);
    } else if package.acquisition.is_prerequisite_skip() {
        let skipped = ui.theme().format_skipped(&line);
        ui.message(&skipped);
    } else {
        ui.success(&line);
    }
}

/// Print the verdict for each prerequisite.
pub fn show_prerequisites(ui: &mut dyn UserInterface, prerequisites: &[PrerequisiteReport]) {
    for report in prerequisites {
        let state = &report.state;
        let version = state.detected_version.as_deref().unwrap_or("not found");
        let line = format!("{}: {}", report.prerequisite, version);
        if state.is_satisfied() {
            ui.success(&line);
        } else if state.suitable_version_present {
            ui.warning(&format!("{} (not on PATH)", line));
        } else if state.detected_version.is_some() {
            ui.warning(&format!("{} (unsuitable)", line));
        } else {
            let line = ui.theme().format_skipped(&line);
            ui.message(&line);
        }
    }
}

/// Print the outcome of a provisioning run.
pub fn show_run_report(ui: &mut dyn UserInterface, report: &RunReport) {
    let manifest = format!(
        "{} ({}{})",
        report.manifest_version,
        report.manifest_origin,
        if report.manifest_refreshed {
            ", refreshed"
        } else {
            ""
        }
    );
    let line = ui.theme().format_pair("Manifest", &manifest);
    ui.message(&line);

    for package in &report.packages {
        show_package(ui, package);
    }

    match report.runtime_ready {
        Some(true) => ui.success("Python is ready"),
        Some(false) => {
            ui.warning("Python was installed but is not reachable yet; open a new terminal")
        }
        None => {}
    }

    let elapsed = report
        .duration()
        .to_std()
        .map(format_duration)
        .unwrap_or_default();
    match report.status {
        RunStatus::Succeeded => ui.success(&format!(
            "Provisioning complete: {} of {} packages ready ({})",
            report.acquired_count() + report.prerequisite_skip_count(),
            report.packages.len(),
            elapsed
        )),
        RunStatus::PartiallyFailed => ui.warning(&format!(
            "Provisioning finished with problems: {} download(s) and {} install(s) failed",
            report.failed_count(),
            report.install_failure_count()
        )),
        RunStatus::Failed if report.cancelled => ui.error("Provisioning cancelled"),
        RunStatus::Failed => ui.error(&format!(
            "Provisioning failed: {}",
            report.fatal.as_deref().unwrap_or("unknown error")
        )),
    }
}

/// Print what happened to the launch script.
pub fn show_launch(ui: &mut dyn UserInterface, outcome: &LaunchOutcome) {
    match outcome {
        LaunchOutcome::Elevated { script } => {
            ui.success(&format!("Started {} as administrator", script.display()))
        }
        LaunchOutcome::Normal { script, pid } => {
            ui.success(&format!("Started {} (pid {})", script.display(), pid))
        }
        LaunchOutcome::Revealed { script } => ui.warning(&format!(
            "Could not start {}; its folder was opened, run it manually",
            script.display()
        )),
        LaunchOutcome::Manual { script } => {
            ui.warning(&format!("Please run {} manually", script.display()))
        }
        LaunchOutcome::NotFound => ui.message("No launch script found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::path::PathBuf;

    #[test]
    fn acquisition_lines() {
        assert_eq!(
            acquisition_line(&AcquisitionResult::Acquired {
                path: PathBuf::from("/dl/a"),
                attempts: 2,
                bytes: 10,
            }),
            "downloaded 10 B (after 2 sources)"
        );
        assert_eq!(
            acquisition_line(&AcquisitionResult::Failed(AcquireFailure::IntegrityMismatch)),
            "checksum mismatch"
        );
        assert_eq!(
            acquisition_line(&AcquisitionResult::Skipped(
                SkipReason::PrerequisiteSatisfied {
                    version: Some("3.11.9".into())
                }
            )),
            "3.11.9 already installed"
        );
    }

    #[test]
    fn install_lines() {
        assert_eq!(install_line(&InstallOutcome::Succeeded), "installed");
        assert_eq!(
            install_line(&InstallOutcome::Failed(InstallFailure::NonZeroExit {
                code: Some(1603),
                stderr: String::new(),
            })),
            "installer exited with 1603"
        );
    }

    #[test]
    fn launch_outcomes_map_to_levels() {
        let mut ui = MockUI::new();
        show_launch(
            &mut ui,
            &LaunchOutcome::Normal {
                script: PathBuf::from("/app/run.bat"),
                pid: 7,
            },
        );
        show_launch(
            &mut ui,
            &LaunchOutcome::Manual {
                script: PathBuf::from("/app/run.bat"),
            },
        );
        show_launch(&mut ui, &LaunchOutcome::NotFound);

        assert!(ui.has_success("pid 7"));
        assert!(ui.has_warning("manually"));
        assert!(ui.has_message("No launch script"));
    }
}
