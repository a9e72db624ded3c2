//! Manifest file format and the validated in-memory model.
//!
//! [`ManifestFile`] mirrors the on-disk JSON document one to one so that a
//! refreshed manifest can be written back without loss. [`Manifest`] is the
//! validated view the pipeline works with: URLs resolved against `base_url`,
//! fallbacks attached to their package, and record invariants checked.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::error::{ProvisionError, Result};

/// Root of the manifest JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Prefix for package URLs that are not absolute.
    #[serde(default)]
    pub base_url: String,

    /// Free-form manifest version, shown in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Package entries, in acquisition order.
    pub packages: Vec<PackageEntry>,

    /// Extra download sources keyed by package name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback_urls: BTreeMap<String, Vec<String>>,
}

/// A single package entry as written in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// File name, also the local file name under the downloads directory.
    pub name: String,

    /// Primary download URL (absolute, or relative to `base_url`).
    #[serde(default)]
    pub url: String,

    /// Expected size in bytes (0 = unknown).
    #[serde(default)]
    pub size: u64,

    /// Expected hex digest (empty = unverified).
    #[serde(default)]
    pub md5: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Extraction target relative to the application directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_to: Option<String>,

    /// Action after download. Only `"extract"` is recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_download: Option<String>,
}

/// What to do with an artifact after it has been verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostDownloadAction {
    /// Leave the file in the downloads directory.
    #[default]
    None,
    /// Expand the archive into its extraction target.
    Extract,
}

impl PostDownloadAction {
    /// Parse the manifest value; anything unrecognised means no action.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "extract" => PostDownloadAction::Extract,
            _ => PostDownloadAction::None,
        }
    }
}

/// A validated package.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub name: String,
    pub primary_url: String,
    pub fallback_urls: Vec<String>,
    pub expected_size_bytes: u64,
    pub checksum: String,
    pub description: String,
    pub post_download_action: PostDownloadAction,
    pub extract_target: String,
}

impl PackageRecord {
    /// Minimal record with a single source, mostly for tests and defaults.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_url: url.into(),
            fallback_urls: Vec::new(),
            expected_size_bytes: 0,
            checksum: String::new(),
            description: String::new(),
            post_download_action: PostDownloadAction::None,
            extract_target: ".".to_string(),
        }
    }

    /// Add a fallback source.
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_urls.push(url.into());
        self
    }

    /// Set the expected checksum.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = checksum.into();
        self
    }

    /// Set the expected size.
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.expected_size_bytes = bytes;
        self
    }

    /// Mark the package for extraction into `target`.
    pub fn with_extract(mut self, target: impl Into<String>) -> Self {
        self.post_download_action = PostDownloadAction::Extract;
        self.extract_target = target.into();
        self
    }

    /// All download sources, primary first. Empty URLs are dropped.
    pub fn sources(&self) -> Vec<&str> {
        std::iter::once(self.primary_url.as_str())
            .chain(self.fallback_urls.iter().map(String::as_str))
            .filter(|u| !u.trim().is_empty())
            .collect()
    }

    /// Whether the artifact should be expanded after download.
    pub fn should_extract(&self) -> bool {
        self.post_download_action == PostDownloadAction::Extract
    }

    /// Whether the artifact is an installer by extension.
    pub fn is_installer(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        lower.ends_with(".exe") || lower.ends_with(".msi")
    }

    /// Directory the archive expands into.
    ///
    /// `"."`, `"self"` and an empty target all mean `app_dir` itself.
    pub fn extract_dir(&self, app_dir: &Path) -> PathBuf {
        match self.extract_target.trim() {
            "" | "." | "self" => app_dir.to_path_buf(),
            target => app_dir.join(target),
        }
    }
}

/// A validated manifest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Manifest {
    pub version: String,
    pub base_url: String,
    pub packages: Vec<PackageRecord>,
}

impl Manifest {
    /// Parse and validate a JSON document.
    ///
    /// `source_name` names the file or URL in error messages.
    pub fn from_json(content: &str, source_name: &str) -> Result<Self> {
        let file: ManifestFile =
            serde_json::from_str(content).map_err(|e| ProvisionError::ManifestParseFailed {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        Self::from_file(&file, source_name)
    }

    /// Validate a parsed document.
    pub fn from_file(file: &ManifestFile, source_name: &str) -> Result<Self> {
        let invalid = |message: String| ProvisionError::ManifestParseFailed {
            source_name: source_name.to_string(),
            message,
        };

        let mut seen = HashSet::new();
        let mut packages = Vec::with_capacity(file.packages.len());

        for (index, entry) in file.packages.iter().enumerate() {
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(invalid(format!("package #{} has an empty name", index + 1)));
            }
            if !is_plain_file_name(name) {
                return Err(invalid(format!(
                    "package name '{}' must be a plain file name",
                    name
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(invalid(format!("duplicate package name '{}'", name)));
            }

            let action = PostDownloadAction::parse(entry.post_download.as_deref());
            if action == PostDownloadAction::Extract && !name.to_ascii_lowercase().ends_with(".zip")
            {
                return Err(invalid(format!(
                    "package '{}' is marked for extraction but is not a .zip",
                    name
                )));
            }

            let extract_target = entry
                .extract_to
                .as_deref()
                .map(str::trim)
                .unwrap_or(".")
                .to_string();
            if !is_contained_dir(&extract_target) {
                return Err(invalid(format!(
                    "extract_to '{}' of package '{}' leaves the application directory",
                    extract_target, name
                )));
            }

            let fallback_urls = file
                .fallback_urls
                .get(name)
                .map(|urls| urls.iter().map(|u| resolve_url(&file.base_url, u)).collect())
                .unwrap_or_default();

            packages.push(PackageRecord {
                name: name.to_string(),
                primary_url: resolve_url(&file.base_url, &entry.url),
                fallback_urls,
                expected_size_bytes: entry.size,
                checksum: entry.md5.trim().to_string(),
                description: entry.description.clone(),
                post_download_action: action,
                extract_target,
            });
        }

        Ok(Self {
            version: file
                .version
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            base_url: file.base_url.clone(),
            packages,
        })
    }

    /// Look up a package by name.
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Check if the manifest lists no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }
}

/// One normal path component: no separators, drive prefix, `.` or `..`.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\', ':'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        )
}

/// A relative directory that stays below its base.
fn is_contained_dir(target: &str) -> bool {
    !target.starts_with(['/', '\\'])
        && !target.contains(':')
        && !Path::new(target).is_absolute()
        && !target.split(['/', '\\']).any(|part| part == "..")
}

/// Resolve `url` against `base_url` unless it is already absolute.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.contains("://") || base_url.trim().is_empty() {
        return url.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim().trim_end_matches('/'),
        url.trim_start_matches('/')
    )
}
