//! Manifest loading and remote refresh.
//!
//! The store owns the current [`Manifest`] snapshot. It starts from the local
//! manifest file (or the built-in defaults) and can be replaced once, before
//! the pipeline starts, by the first remote source that returns a well-formed
//! document.
//!
//! # Example
//!
//! ```no_run
//! use hostprep::manifest::ManifestStore;
//! use hostprep::progress::NullSink;
//!
//! let mut store = ManifestStore::load("cloud_config.json");
//! let urls = vec!["https://example.com/cloud_config.json".to_string()];
//! if !store.refresh_from_remote(&urls, &NullSink) {
//!     println!("using local manifest {}", store.manifest().version);
//! }
//! ```

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::CACHE_CONTROL;
use serde::Serialize;

use super::defaults::builtin_manifest;
use super::schema::{Manifest, ManifestFile};
use crate::error::{ProvisionError, Result};
use crate::fetch::client::build_client;
use crate::progress::ProgressSink;

/// Default timeout for manifest requests.
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the current manifest snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum ManifestOrigin {
    /// Parsed from the local manifest file.
    Local,
    /// Built-in defaults (local file missing or malformed).
    Builtin,
    /// Fetched from the given URL during this run.
    Remote(String),
}

impl fmt::Display for ManifestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestOrigin::Local => write!(f, "local file"),
            ManifestOrigin::Builtin => write!(f, "built-in defaults"),
            ManifestOrigin::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// Owns the manifest snapshot and its on-disk location.
#[derive(Debug)]
pub struct ManifestStore {
    path: PathBuf,
    manifest: Manifest,
    origin: ManifestOrigin,
    timeout: Duration,
}

impl ManifestStore {
    /// Load the manifest at `path`, falling back to the built-in defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (manifest, origin) = match fs::read_to_string(&path) {
            Ok(content) => match Manifest::from_json(&content, &path.display().to_string()) {
                Ok(manifest) => (manifest, ManifestOrigin::Local),
                Err(e) => {
                    tracing::warn!("{}; using built-in manifest", e);
                    (builtin_manifest(), ManifestOrigin::Builtin)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No manifest at {}; using built-in", path.display());
                (builtin_manifest(), ManifestOrigin::Builtin)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read {}: {}; using built-in manifest",
                    path.display(),
                    e
                );
                (builtin_manifest(), ManifestOrigin::Builtin)
            }
        };

        Self {
            path,
            manifest,
            origin,
            timeout: MANIFEST_TIMEOUT,
        }
    }

    /// Override the remote request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the manifest with the first well-formed remote copy.
    ///
    /// URLs are tried in order. On success the previous local file is kept
    /// as `<path>.bak`, the new document is written atomically and the
    /// in-memory snapshot replaced. Returns false if every source failed, in
    /// which case nothing changes.
    pub fn refresh_from_remote(&mut self, urls: &[String], sink: &dyn ProgressSink) -> bool {
        if urls.is_empty() {
            tracing::debug!("No remote manifest sources configured");
            return false;
        }

        let client = match build_client(self.timeout) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("{}", e);
                return false;
            }
        };

        for (index, url) in urls.iter().enumerate() {
            let label = if index == 0 {
                "primary".to_string()
            } else {
                format!("fallback {}", index)
            };
            sink.detail(&format!("Fetching manifest from {} source", label));

            let (file, manifest) = match fetch_manifest(&client, url) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!("{}", e);
                    sink.detail(&format!("Manifest {} source rejected", label));
                    continue;
                }
            };

            if let Err(e) = self.persist(&file) {
                tracing::warn!("Failed to save manifest to {}: {}", self.path.display(), e);
                sink.detail("Could not save the refreshed manifest; keeping local copy");
                return false;
            }

            tracing::info!(
                "Manifest {} loaded from {} ({} packages)",
                manifest.version,
                url,
                manifest.len()
            );
            sink.detail(&format!("Manifest updated to version {}", manifest.version));
            self.manifest = manifest;
            self.origin = ManifestOrigin::Remote(url.clone());
            return true;
        }

        sink.detail("All manifest sources failed; using local manifest");
        false
    }

    /// The current snapshot.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Where the current snapshot came from.
    pub fn origin(&self) -> &ManifestOrigin {
        &self.origin
    }

    /// Local manifest file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the previous manifest after a refresh.
    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".bak")
    }

    fn persist(&self, file: &ManifestFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, self.backup_path()) {
                tracing::warn!("Failed to back up {}: {}", self.path.display(), e);
            }
        }

        let content = serde_json::to_string_pretty(file)
            .map_err(|e| anyhow::anyhow!("Failed to serialize manifest: {}", e))?;

        // Write to a sibling and rename so readers never see a partial file
        let temp_path = with_suffix(&self.path, ".tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn fetch_manifest(
    client: &reqwest::blocking::Client,
    url: &str,
) -> Result<(ManifestFile, Manifest)> {
    let fetch_failed = |message: String| ProvisionError::ManifestFetchFailed {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .map_err(|e| fetch_failed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fetch_failed(format!("HTTP {}", response.status())));
    }

    let body = response.text().map_err(|e| fetch_failed(e.to_string()))?;
    let file: ManifestFile =
        serde_json::from_str(&body).map_err(|e| ProvisionError::ManifestParseFailed {
            source_name: url.to_string(),
            message: e.to_string(),
        })?;
    let manifest = Manifest::from_file(&file, url)?;
    Ok((file, manifest))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
