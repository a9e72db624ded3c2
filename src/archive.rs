//! Zip expansion with per-entry fault tolerance.
//!
//! A structurally broken archive is reported as [`ProvisionError::ArchiveCorrupt`]
//! and left on disk. Once the archive opens, each entry is extracted on its
//! own: a failing entry is logged, its partial output removed, and the rest
//! still extracted. The archive is deleted after all entries were visited.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::ZipArchive;

use crate::error::{ProvisionError, Result};
use crate::progress::{ProgressEvent, ProgressSink};

/// Entries between extract progress events.
const PROGRESS_EVERY: usize = 10;

/// What an expansion did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandSummary {
    /// Directory the archive was expanded into.
    pub target: PathBuf,
    /// Entries listed in the archive.
    pub total_entries: usize,
    /// Entries written (files and directories).
    pub extracted: usize,
    /// Names of entries that failed.
    pub failed: Vec<String>,
    /// Whether the archive file was deleted afterwards.
    pub archive_removed: bool,
}

/// Expands zip archives, reporting to a progress sink.
pub struct ArchiveExpander<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> ArchiveExpander<'a> {
    /// Create an expander reporting to `sink`.
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink }
    }

    /// Expand `archive` into `target_dir`, creating it if needed.
    pub fn expand(&self, archive: &Path, target_dir: &Path) -> Result<ExpandSummary> {
        let archive_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| archive.display().to_string());

        fs::create_dir_all(target_dir)?;

        let corrupt = |message: String| ProvisionError::ArchiveCorrupt {
            path: archive.to_path_buf(),
            message,
        };
        let file = File::open(archive).map_err(|e| corrupt(e.to_string()))?;
        let mut zip = ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

        let total = zip.len();
        tracing::info!(
            "Expanding {} ({} entries) into {}",
            archive_name,
            total,
            target_dir.display()
        );
        self.sink
            .detail(&format!("Extracting {} ({} entries)", archive_name, total));

        let mut summary = ExpandSummary {
            target: target_dir.to_path_buf(),
            total_entries: total,
            extracted: 0,
            failed: Vec::new(),
            archive_removed: false,
        };

        for index in 0..total {
            if self.sink.should_cancel() {
                return Err(ProvisionError::Cancelled);
            }

            match extract_entry(&mut zip, index, target_dir) {
                Ok(()) => summary.extracted += 1,
                Err(ProvisionError::ArchiveEntryError { entry, message }) => {
                    tracing::warn!("{}: skipping '{}': {}", archive_name, entry, message);
                    self.sink
                        .detail(&format!("Could not extract {}: {}", entry, message));
                    summary.failed.push(entry);
                }
                Err(e) => return Err(e),
            }

            if index % PROGRESS_EVERY == 0 || index + 1 == total {
                self.sink.on_progress(&ProgressEvent::Extract {
                    archive: archive_name.clone(),
                    done: index + 1,
                    total,
                });
            }
        }

        // Release the handle before deleting; Windows refuses otherwise.
        drop(zip);

        match fs::remove_file(archive) {
            Ok(()) => summary.archive_removed = true,
            Err(e) => tracing::warn!("Failed to remove {}: {}", archive.display(), e),
        }

        self.sink.detail(&format!(
            "Extracted {} of {} entries from {}",
            summary.extracted, total, archive_name
        ));
        Ok(summary)
    }
}

fn extract_entry(zip: &mut ZipArchive<File>, index: usize, target_dir: &Path) -> Result<()> {
    let mut entry = zip
        .by_index(index)
        .map_err(|e| ProvisionError::ArchiveEntryError {
            entry: format!("#{}", index),
            message: e.to_string(),
        })?;

    let name = entry.name().to_string();
    let entry_error = |message: String| ProvisionError::ArchiveEntryError {
        entry: name.clone(),
        message,
    };

    let relative = entry
        .enclosed_name()
        .ok_or_else(|| entry_error("path escapes the extraction directory".to_string()))?;
    let out_path = target_dir.join(relative);

    if entry.is_dir() {
        fs::create_dir_all(&out_path).map_err(|e| entry_error(e.to_string()))?;
        return Ok(());
    }

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).map_err(|e| entry_error(e.to_string()))?;
    }

    let written = File::create(&out_path).and_then(|mut out| io::copy(&mut entry, &mut out));
    if let Err(e) = written {
        let _ = fs::remove_file(&out_path);
        return Err(entry_error(e.to_string()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode)).ok();
        }
    }

    Ok(())
}
