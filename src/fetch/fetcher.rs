//! Multi-source downloads with ordered fallback.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use super::attempt::{AttemptState, SourceAttempts};
use super::client::build_client;
use super::provider::SourceProvider;
use crate::error::{ProvisionError, Result};
use crate::manifest::PackageRecord;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::verify;

/// Default per-request timeout for artifact downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const CHUNK_SIZE: usize = 8192;

/// Why a package was not downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A verified copy is already on disk.
    AlreadyPresent { path: PathBuf },
    /// The host already has a suitable version of the program.
    PrerequisiteSatisfied { version: Option<String> },
}

/// Why a package could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum AcquireFailure {
    /// Every source failed.
    NetworkExhausted { attempts: usize, last_error: String },
    /// The downloaded file did not match its checksum and was removed.
    IntegrityMismatch,
    /// The caller asked to stop.
    Cancelled,
}

impl AcquireFailure {
    /// Convert into the crate error for callers that propagate.
    pub fn into_error(self, package: &str, path: &Path) -> ProvisionError {
        match self {
            AcquireFailure::NetworkExhausted {
                attempts,
                last_error,
            } => ProvisionError::NetworkExhausted {
                package: package.to_string(),
                attempts,
                last_error,
            },
            AcquireFailure::IntegrityMismatch => ProvisionError::IntegrityMismatch {
                path: path.to_path_buf(),
            },
            AcquireFailure::Cancelled => ProvisionError::Cancelled,
        }
    }
}

/// Outcome of acquiring one package. Produced once per package per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum AcquisitionResult {
    Skipped(SkipReason),
    Acquired {
        path: PathBuf,
        /// Sources started, including the one that succeeded.
        attempts: usize,
        bytes: u64,
    },
    Failed(AcquireFailure),
}

impl AcquisitionResult {
    /// Path of a usable artifact, whether freshly downloaded or already present.
    pub fn artifact(&self) -> Option<&Path> {
        match self {
            AcquisitionResult::Acquired { path, .. } => Some(path),
            AcquisitionResult::Skipped(SkipReason::AlreadyPresent { path }) => Some(path),
            _ => None,
        }
    }

    /// Check if the package was skipped because the host already has it.
    pub fn is_prerequisite_skip(&self) -> bool {
        matches!(
            self,
            AcquisitionResult::Skipped(SkipReason::PrerequisiteSatisfied { .. })
        )
    }

    /// Check if acquisition failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, AcquisitionResult::Failed(_))
    }
}

/// Downloads a package from its primary source, falling back in order.
///
/// No parallelism and no backoff: one source at a time, next source on any
/// transport error or non-2xx status.
pub struct FallbackFetcher<'a> {
    client: reqwest::blocking::Client,
    sink: &'a dyn ProgressSink,
}

impl<'a> FallbackFetcher<'a> {
    /// Create a fetcher with the default request timeout.
    pub fn new(sink: &'a dyn ProgressSink) -> Result<Self> {
        Self::with_timeout(sink, DOWNLOAD_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(sink: &'a dyn ProgressSink, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            sink,
        })
    }

    /// Acquire `record` into `destination`.
    ///
    /// An existing file that passes verification is reused without any
    /// network access. When every source fails, a partially written file may
    /// remain at `destination` for the caller to discard.
    pub fn acquire(&self, record: &PackageRecord, destination: &Path) -> AcquisitionResult {
        if verify::verify(destination, &record.checksum) {
            tracing::info!("{} already present at {}", record.name, destination.display());
            self.sink
                .detail(&format!("{} already present, skipping download", record.name));
            return AcquisitionResult::Skipped(SkipReason::AlreadyPresent {
                path: destination.to_path_buf(),
            });
        }

        let sources = record.sources();
        let mut attempts = SourceAttempts::new(sources.len());
        let mut last_error = String::from("no download source configured");

        let mut state = attempts.begin();
        while let AttemptState::Trying(index) = state {
            if self.sink.should_cancel() {
                return AcquisitionResult::Failed(AcquireFailure::Cancelled);
            }

            let url = sources[index];
            let label = source_label(index);
            let provider = SourceProvider::classify(url);
            tracing::debug!("{}: trying {} source {} ({})", record.name, label, url, provider);
            self.sink.detail(&format!(
                "Downloading {} from {} source ({})",
                record.name, label, provider
            ));

            state = match self.download(url, record, destination) {
                Ok(bytes) => {
                    tracing::info!("{}: {} bytes from {} source", record.name, bytes, label);
                    self.sink
                        .detail(&format!("Downloaded {} from {} source", record.name, label));
                    attempts.succeed();
                    return AcquisitionResult::Acquired {
                        path: destination.to_path_buf(),
                        attempts: attempts.attempts(),
                        bytes,
                    };
                }
                Err(ProvisionError::Cancelled) => {
                    return AcquisitionResult::Failed(AcquireFailure::Cancelled);
                }
                Err(e) => {
                    tracing::warn!("{}: {} source failed: {}", record.name, label, e);
                    self.sink
                        .detail(&format!("{} source failed for {}", label, record.name));
                    last_error = e.to_string();
                    attempts.fail()
                }
            };
        }

        tracing::debug!(
            "{}: {:?} after {} attempt(s)",
            record.name,
            attempts.state(),
            attempts.attempts()
        );
        self.sink
            .detail(&format!("All download sources failed for {}", record.name));
        AcquisitionResult::Failed(AcquireFailure::NetworkExhausted {
            attempts: attempts.attempts(),
            last_error,
        })
    }

    /// Stream one source to `destination`, returning the bytes written.
    fn download(&self, url: &str, record: &PackageRecord, destination: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| anyhow::anyhow!("request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP {} fetching {}", status, url).into());
        }

        let total = response
            .content_length()
            .filter(|len| *len > 0)
            .unwrap_or(record.expected_size_bytes);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(destination)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| anyhow::anyhow!("reading body from {} failed: {}", url, e))?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            written += n as u64;

            self.sink.on_progress(&ProgressEvent::Transfer {
                package: record.name.clone(),
                bytes: written,
                total,
            });

            if self.sink.should_cancel() {
                return Err(ProvisionError::Cancelled);
            }
        }

        file.flush()?;
        Ok(written)
    }
}

fn source_label(index: usize) -> String {
    if index == 0 {
        "primary".to_string()
    } else {
        format!("fallback {}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingSink;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    const UNREACHABLE: &str = "http://127.0.0.1:1/unreachable.bin";

    fn fetcher(sink: &RecordingSink) -> FallbackFetcher<'_> {
        FallbackFetcher::with_timeout(sink, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn third_source_succeeds_after_two_failures() {
        let server = MockServer::start();
        let missing = server.mock(|when, then| {
            when.method(GET).path("/a/pkg.bin");
            then.status(404);
        });
        let broken = server.mock(|when, then| {
            when.method(GET).path("/b/pkg.bin");
            then.status(500);
        });
        let good = server.mock(|when, then| {
            when.method(GET).path("/c/pkg.bin");
            then.status(200).body("payload");
        });

        let record = PackageRecord::new("pkg.bin", server.url("/a/pkg.bin"))
            .with_fallback(server.url("/b/pkg.bin"))
            .with_fallback(server.url("/c/pkg.bin"));
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("pkg.bin");
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &dest);

        assert_eq!(
            result,
            AcquisitionResult::Acquired {
                path: dest.clone(),
                attempts: 3,
                bytes: 7,
            }
        );
        missing.assert_calls(1);
        broken.assert_calls(1);
        good.assert_calls(1);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
    }

    #[test]
    fn unreachable_primary_falls_back() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/mirror/ten.bin");
            then.status(200).body("0123456789");
        });

        let record = PackageRecord::new("ten.bin", UNREACHABLE)
            .with_fallback(server.url("/mirror/ten.bin"));
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("ten.bin");
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &dest);

        assert!(matches!(
            result,
            AcquisitionResult::Acquired {
                attempts: 2,
                bytes: 10,
                ..
            }
        ));
        assert_eq!(fs::metadata(&dest).unwrap().len(), 10);
        assert!(sink.has_detail("primary source failed"));
    }

    #[test]
    fn all_sources_failing_is_network_exhausted() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone.bin");
            then.status(404);
        });

        let record =
            PackageRecord::new("gone.bin", UNREACHABLE).with_fallback(server.url("/gone.bin"));
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("gone.bin");
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &dest);

        match result {
            AcquisitionResult::Failed(AcquireFailure::NetworkExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("404"), "unexpected error: {}", last_error);
            }
            other => panic!("expected NetworkExhausted, got {:?}", other),
        }
        assert!(!verify::verify(&dest, ""));
    }

    #[test]
    fn record_without_sources_fails_without_attempts() {
        let record = PackageRecord::new("empty.bin", "");
        let temp = TempDir::new().unwrap();
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &temp.path().join("empty.bin"));

        assert!(matches!(
            result,
            AcquisitionResult::Failed(AcquireFailure::NetworkExhausted { attempts: 0, .. })
        ));
    }

    #[test]
    fn existing_valid_file_skips_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/present.bin");
            then.status(200).body("fresh");
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("present.bin");
        fs::write(&dest, "cached").unwrap();
        let record = PackageRecord::new("present.bin", server.url("/present.bin"));
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &dest);

        assert_eq!(
            result,
            AcquisitionResult::Skipped(SkipReason::AlreadyPresent { path: dest.clone() })
        );
        mock.assert_calls(0);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "cached");
    }

    #[test]
    fn existing_file_with_wrong_checksum_is_downloaded_again() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/hello.txt");
            then.status(200).body("hello world");
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("hello.txt");
        fs::write(&dest, "stale").unwrap();
        let record = PackageRecord::new("hello.txt", server.url("/hello.txt"))
            .with_checksum("5eb63bbbe01eeed093cb22bb8f5acdc3");
        let sink = RecordingSink::new();

        let result = fetcher(&sink).acquire(&record, &dest);

        assert!(matches!(result, AcquisitionResult::Acquired { .. }));
        mock.assert_calls(1);
        assert!(verify::verify(&dest, &record.checksum));
    }

    #[test]
    fn transfer_events_report_content_length() {
        let server = MockServer::start();
        let body = vec![b'x'; CHUNK_SIZE * 2 + 100];
        server.mock(|when, then| {
            when.method(GET).path("/big.bin");
            then.status(200).body(body.clone());
        });

        let record = PackageRecord::new("big.bin", server.url("/big.bin")).with_size(1);
        let temp = TempDir::new().unwrap();
        let sink = RecordingSink::new();

        fetcher(&sink).acquire(&record, &temp.path().join("big.bin"));

        let transfers: Vec<_> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Transfer { bytes, total, .. } => Some((bytes, total)),
                _ => None,
            })
            .collect();
        assert!(transfers.len() >= 3);
        let (last_bytes, last_total) = transfers[transfers.len() - 1];
        assert_eq!(last_bytes, body.len() as u64);
        assert_eq!(last_total, body.len() as u64);
        assert!(transfers.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn cancellation_stops_download() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow.bin");
            then.status(200).body(vec![0u8; CHUNK_SIZE * 4]);
        });

        let record = PackageRecord::new("slow.bin", server.url("/slow.bin"));
        let temp = TempDir::new().unwrap();
        let sink = RecordingSink::new();
        sink.cancel_after(2);

        let result = fetcher(&sink).acquire(&record, &temp.path().join("slow.bin"));

        assert_eq!(result, AcquisitionResult::Failed(AcquireFailure::Cancelled));
        assert!(sink.transfer_count() < 4);
    }

    #[test]
    fn failure_converts_to_error() {
        let err = AcquireFailure::NetworkExhausted {
            attempts: 2,
            last_error: "timeout".into(),
        }
        .into_error("a.bin", Path::new("/d/a.bin"));
        assert!(matches!(err, ProvisionError::NetworkExhausted { attempts: 2, .. }));
    }

    #[test]
    fn artifact_covers_fresh_and_present() {
        let fresh = AcquisitionResult::Acquired {
            path: PathBuf::from("/d/a"),
            attempts: 1,
            bytes: 1,
        };
        let present = AcquisitionResult::Skipped(SkipReason::AlreadyPresent {
            path: PathBuf::from("/d/b"),
        });
        let skipped = AcquisitionResult::Skipped(SkipReason::PrerequisiteSatisfied {
            version: Some("3.11.9".into()),
        });
        assert_eq!(fresh.artifact(), Some(Path::new("/d/a")));
        assert_eq!(present.artifact(), Some(Path::new("/d/b")));
        assert_eq!(skipped.artifact(), None);
        assert!(skipped.is_prerequisite_skip());
    }
}
