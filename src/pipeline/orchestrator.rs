//! The provisioning run: refresh, probe, acquire, expand, install, wait.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::report::{ExtractionOutcome, PackageReport, PrerequisiteReport, RunReport};
use crate::archive::ArchiveExpander;
use crate::config::Settings;
use crate::fetch::{AcquireFailure, AcquisitionResult, FallbackFetcher, SkipReason};
use crate::install::{is_known_installer, InstallExecutor};
use crate::manifest::{ManifestStore, PackageRecord};
use crate::probe::{Prerequisite, PrerequisiteState, SystemProbe};
use crate::progress::ProgressSink;
use crate::readiness::ReadinessWaiter;
use crate::shell::{elevation_hint, ProcessRunner};
use crate::verify;

/// Drives one provisioning run over the current manifest.
///
/// Packages are handled strictly one after another. Per-package failures are
/// recorded in the [`RunReport`] and never stop the run; the run only gives
/// up before installing when nothing at all could be acquired.
pub struct Provisioner<'a> {
    settings: &'a Settings,
    runner: &'a dyn ProcessRunner,
    probe: &'a dyn SystemProbe,
    sink: &'a dyn ProgressSink,
    refresh: bool,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn ProcessRunner,
        probe: &'a dyn SystemProbe,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            settings,
            runner,
            probe,
            sink,
            refresh: true,
        }
    }

    /// Skip the remote manifest refresh.
    pub fn without_refresh(mut self) -> Self {
        self.refresh = false;
        self
    }

    /// Run the whole pipeline. Never fails; everything ends up in the report.
    pub fn run(&self) -> RunReport {
        let app_dir = self.settings.app_dir();
        tracing::info!("Provisioning into {}", app_dir.display());

        self.sink.stage(1.0, "Checking for manifest updates");
        let mut store = ManifestStore::load(self.settings.manifest_path())
            .with_timeout(self.settings.manifest_timeout());
        let refreshed = self.refresh
            && !self.settings.manifest_urls.is_empty()
            && store.refresh_from_remote(&self.settings.manifest_urls, self.sink);
        if refreshed {
            self.sink.stage(8.0, "Manifest updated");
        } else {
            self.sink.stage(8.0, "Using local manifest");
        }

        let manifest = store.manifest();
        let mut report = RunReport::begin(manifest.version.clone(), store.origin().clone());
        report.manifest_refreshed = refreshed;

        if manifest.is_empty() {
            tracing::warn!("Manifest {} lists no packages", manifest.version);
            report.fatal = Some("manifest lists no packages".to_string());
            return report.finish();
        }

        self.warn_if_not_elevated();

        self.sink.stage(10.0, "Checking installed software");
        let states = self.probe_prerequisites();
        report.prerequisites = Prerequisite::ALL
            .into_iter()
            .filter_map(|p| {
                states.get(&p).map(|state| PrerequisiteReport {
                    prerequisite: p,
                    state: state.clone(),
                })
            })
            .collect();

        let downloads_dir = self.settings.downloads_dir();
        if let Err(e) = fs::create_dir_all(&downloads_dir) {
            tracing::warn!("Cannot create {}: {}", downloads_dir.display(), e);
            report.fatal = Some(format!(
                "cannot create download directory {}: {}",
                downloads_dir.display(),
                e
            ));
            return report.finish();
        }

        let fetcher = match FallbackFetcher::with_timeout(self.sink, self.settings.request_timeout()) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                report.fatal = Some(e.to_string());
                return report.finish();
            }
        };
        let expander = ArchiveExpander::new(self.sink);

        let total = manifest.packages.len();
        for (index, record) in manifest.packages.iter().enumerate() {
            if self.sink.should_cancel() {
                tracing::info!("Cancelled before {}", record.name);
                report.cancelled = true;
                break;
            }
            self.sink.stage(
                12.0 + 8.0 * index as f32 / total as f32,
                &format!("Downloading {} ({}/{})", record.name, index + 1, total),
            );

            let acquisition = self.acquire(&fetcher, record, &downloads_dir, &states);
            if acquisition == AcquisitionResult::Failed(AcquireFailure::Cancelled) {
                report.cancelled = true;
            }
            let mut package = PackageReport::new(&record.name, acquisition);

            if record.should_extract() {
                if let Some(archive) = package.acquisition.artifact() {
                    package.extraction = Some(self.expand(&expander, archive, record, &app_dir));
                }
            }
            report.packages.push(package);

            if report.cancelled {
                break;
            }
        }

        if report.cancelled {
            self.sink.detail("Provisioning cancelled");
            return report.finish();
        }

        let needs_download = report
            .packages
            .iter()
            .any(|p| !p.acquisition.is_prerequisite_skip());
        if needs_download && report.acquired_count() == 0 {
            tracing::error!("No package could be acquired");
            self.sink.detail("No package could be downloaded; nothing to install");
            report.fatal = Some("no package could be acquired".to_string());
            return report.finish();
        }
        self.sink.stage(
            20.0,
            &format!("{} of {} packages available", report.acquired_count(), total),
        );

        let executor = InstallExecutor::new(self.runner, self.probe, self.sink)
            .with_timeout(self.settings.install_timeout());
        self.install_all(&executor, &mut report, &manifest.packages);

        if let Some(installed_at) = executor.runtime_installed_at() {
            self.sink.stage(95.0, "Waiting for Python to become available");
            let ready = ReadinessWaiter::new(self.runner, self.sink).await_ready(
                installed_at,
                self.settings.readiness_min(),
                self.settings.readiness_max(),
            );
            if !ready {
                self.sink
                    .detail("Python may need a new terminal or a restart to be found");
            }
            report.runtime_ready = Some(ready);
        }

        let report = report.finish();
        tracing::info!(
            "Run finished: {:?} ({} acquired, {} failed)",
            report.status,
            report.acquired_count(),
            report.failed_count()
        );
        self.sink.stage(98.0, "Provisioning finished");
        report
    }

    fn warn_if_not_elevated(&self) {
        if self.probe.has_elevated_privileges() {
            return;
        }
        tracing::warn!("Not running with elevated privileges");
        self.sink
            .detail("Not running as administrator; some installers may fail");
        self.sink.detail(elevation_hint());
    }

    fn probe_prerequisites(&self) -> HashMap<Prerequisite, PrerequisiteState> {
        Prerequisite::ALL
            .into_iter()
            .map(|prerequisite| {
                let state = self.probe.check(prerequisite);
                match (&state.detected_version, state.is_satisfied()) {
                    (Some(version), true) => self.sink.detail(&format!(
                        "Found suitable {} {}, skipping download",
                        prerequisite, version
                    )),
                    (Some(version), false) => self.sink.detail(&format!(
                        "{} {} found but unsuitable or unreachable; will install",
                        prerequisite, version
                    )),
                    (None, _) => self.sink.detail(&format!(
                        "{} not found; will install",
                        prerequisite
                    )),
                }
                (prerequisite, state)
            })
            .collect()
    }

    /// Acquire and verify one package, cleaning up anything unusable.
    fn acquire(
        &self,
        fetcher: &FallbackFetcher<'_>,
        record: &PackageRecord,
        downloads_dir: &Path,
        states: &HashMap<Prerequisite, PrerequisiteState>,
    ) -> AcquisitionResult {
        let satisfied = Prerequisite::for_package(&record.name)
            .and_then(|p| states.get(&p))
            .filter(|state| state.is_satisfied());
        if let Some(state) = satisfied {
            return AcquisitionResult::Skipped(SkipReason::PrerequisiteSatisfied {
                version: state.detected_version.clone(),
            });
        }

        let destination = downloads_dir.join(&record.name);
        match fetcher.acquire(record, &destination) {
            AcquisitionResult::Acquired { path, .. } if !verify::verify(&path, &record.checksum) => {
                tracing::warn!(
                    "{}",
                    AcquireFailure::IntegrityMismatch.into_error(&record.name, &path)
                );
                self.sink
                    .detail(&format!("{} failed verification and was removed", record.name));
                discard(&path);
                AcquisitionResult::Failed(AcquireFailure::IntegrityMismatch)
            }
            AcquisitionResult::Failed(failure) => {
                tracing::warn!("{}", failure.clone().into_error(&record.name, &destination));
                discard(&destination);
                AcquisitionResult::Failed(failure)
            }
            result => result,
        }
    }

    fn expand(
        &self,
        expander: &ArchiveExpander<'_>,
        archive: &Path,
        record: &PackageRecord,
        app_dir: &Path,
    ) -> ExtractionOutcome {
        let target = record.extract_dir(app_dir);
        self.sink
            .detail(&format!("Extracting {} to {}", record.name, target.display()));
        match expander.expand(archive, &target) {
            Ok(summary) => ExtractionOutcome::Expanded(summary),
            Err(e) => {
                tracing::warn!("Extracting {} failed: {}", record.name, e);
                self.sink
                    .detail(&format!("Could not extract {}; archive kept", record.name));
                ExtractionOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Install every acquired executable, runtime first.
    fn install_all(
        &self,
        executor: &InstallExecutor<'_>,
        report: &mut RunReport,
        records: &[PackageRecord],
    ) {
        let mut queue: Vec<(usize, PathBuf)> = report
            .packages
            .iter()
            .enumerate()
            .filter_map(|(index, package)| {
                let record = records.iter().find(|r| r.name == package.name)?;
                let installable = !record.should_extract()
                    && (record.is_installer() || is_known_installer(&record.name));
                let path = package.acquisition.artifact()?;
                installable.then(|| (index, path.to_path_buf()))
            })
            .collect();
        queue.sort_by_key(|(index, _)| {
            Prerequisite::for_package(&report.packages[*index].name) != Some(Prerequisite::Runtime)
        });

        if queue.is_empty() {
            self.sink.detail("Nothing to install");
            return;
        }

        let total = queue.len();
        for (position, (index, path)) in queue.into_iter().enumerate() {
            if self.sink.should_cancel() {
                report.cancelled = true;
                return;
            }
            let name = report.packages[index].name.clone();
            self.sink.stage(
                20.0 + 65.0 * position as f32 / total as f32,
                &format!("Installing {} ({}/{})", name, position + 1, total),
            );
            report.packages[index].install = Some(executor.install(&path));
        }
        self.sink.stage(85.0, "Installers finished");
    }
}

/// Remove a file left behind by a failed acquisition.
fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
