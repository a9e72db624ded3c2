//! Artifact acquisition: HTTP client, fallback chain and source labels.

pub mod attempt;
pub mod client;
pub mod fetcher;
pub mod provider;

pub use attempt::{AttemptState, SourceAttempts};
pub use client::{build_client, BROWSER_USER_AGENT};
pub use fetcher::{AcquireFailure, AcquisitionResult, FallbackFetcher, SkipReason, DOWNLOAD_TIMEOUT};
pub use provider::SourceProvider;
