//! Aggregate result of a provisioning run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::archive::ExpandSummary;
use crate::fetch::AcquisitionResult;
use crate::install::InstallOutcome;
use crate::manifest::ManifestOrigin;
use crate::probe::{Prerequisite, PrerequisiteState};

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every package is in place.
    Succeeded,
    /// At least one package failed, but something usable was provisioned.
    PartiallyFailed,
    /// Nothing could be provisioned, or the run was cancelled.
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Succeeded => 0,
            RunStatus::Failed => 1,
            RunStatus::PartiallyFailed => 2,
        }
    }
}

/// Result of expanding a package archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Expanded(ExpandSummary),
    /// The archive could not be expanded and was kept on disk.
    Failed { message: String },
}

/// Everything that happened to one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub name: String,
    pub acquisition: AcquisitionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallOutcome>,
}

impl PackageReport {
    pub fn new(name: impl Into<String>, acquisition: AcquisitionResult) -> Self {
        Self {
            name: name.into(),
            acquisition,
            extraction: None,
            install: None,
        }
    }

    /// Whether any step for this package failed.
    pub fn has_failure(&self) -> bool {
        self.acquisition.is_failed()
            || matches!(self.extraction, Some(ExtractionOutcome::Failed { .. }))
            || matches!(self.install, Some(ref outcome) if !outcome.is_ok())
    }
}

/// Probe verdict for one prerequisite, as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrerequisiteReport {
    pub prerequisite: Prerequisite,
    #[serde(flatten)]
    pub state: PrerequisiteState,
}

/// Aggregate result of [`Provisioner::run`](super::Provisioner::run).
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub manifest_version: String,
    pub manifest_origin: ManifestOrigin,
    pub manifest_refreshed: bool,
    pub prerequisites: Vec<PrerequisiteReport>,
    pub packages: Vec<PackageReport>,
    /// Result of the post-install runtime check, when a runtime was installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_ready: Option<bool>,
    pub cancelled: bool,
    /// Why the run stopped before installing anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<String>,
    pub status: RunStatus,
}

impl RunReport {
    pub(crate) fn begin(manifest_version: String, manifest_origin: ManifestOrigin) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            manifest_version,
            manifest_origin,
            manifest_refreshed: false,
            prerequisites: Vec::new(),
            packages: Vec::new(),
            runtime_ready: None,
            cancelled: false,
            fatal: None,
            status: RunStatus::Succeeded,
        }
    }

    /// Stamp the end time and derive the status.
    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self.status = if self.fatal.is_some() || self.cancelled {
            RunStatus::Failed
        } else if self.packages.iter().any(PackageReport::has_failure) {
            RunStatus::PartiallyFailed
        } else {
            RunStatus::Succeeded
        };
        self
    }

    /// Packages with a usable artifact (downloaded or already present).
    pub fn acquired_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|p| p.acquisition.artifact().is_some())
            .count()
    }

    /// Packages skipped because the host already has the program.
    pub fn prerequisite_skip_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|p| p.acquisition.is_prerequisite_skip())
            .count()
    }

    /// Packages whose download failed.
    pub fn failed_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|p| p.acquisition.is_failed())
            .count()
    }

    /// Installers that ran and failed.
    pub fn install_failure_count(&self) -> usize {
        self.packages
            .iter()
            .filter(|p| matches!(p.install, Some(ref outcome) if !outcome.is_ok()))
            .count()
    }

    /// Look up a package by name.
    pub fn package(&self, name: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}
