//! End-to-end provisioning run and its report.

pub mod orchestrator;
pub mod report;

pub use orchestrator::Provisioner;
pub use report::{ExtractionOutcome, PackageReport, PrerequisiteReport, RunReport, RunStatus};
