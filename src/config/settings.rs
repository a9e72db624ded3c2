//! Runtime settings for a provisioning run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ProvisionError, Result};
use crate::shell::application_dir;

/// File name of the manifest inside the application directory.
pub const MANIFEST_FILE_NAME: &str = "cloud_config.json";

/// Directory for downloaded artifacts inside the application directory.
pub const DOWNLOADS_DIR_NAME: &str = "downloads";

/// Settings for one run.
///
/// Every field has a default, so an empty or partial settings file is valid.
/// Paths left unset are derived from the application directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root for downloads, the manifest and extracted archives.
    pub app_dir: Option<PathBuf>,

    /// Where artifacts are downloaded (default: `<app_dir>/downloads`).
    pub downloads_dir: Option<PathBuf>,

    /// Local manifest file (default: `<app_dir>/cloud_config.json`).
    pub manifest_path: Option<PathBuf>,

    /// Remote manifest URLs tried in order by a refresh.
    pub manifest_urls: Vec<String>,

    /// Connect and read timeout for artifact downloads.
    pub request_timeout_secs: u64,

    /// Timeout for each remote manifest request.
    pub manifest_timeout_secs: u64,

    /// Ceiling for one installer run.
    pub install_timeout_secs: u64,

    /// Minimum time after a runtime install before it is checked.
    pub readiness_min_secs: u64,

    /// Past this, a runtime install is checked without waiting.
    pub readiness_max_secs: u64,

    /// File name of the script started after provisioning.
    pub launch_script: String,

    /// Directory expected to hold the launch script.
    pub project_dir: String,

    /// Name fragments of directories searched first for the launch script.
    pub project_dir_hints: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_dir: None,
            downloads_dir: None,
            manifest_path: None,
            manifest_urls: Vec::new(),
            request_timeout_secs: 30,
            manifest_timeout_secs: 15,
            install_timeout_secs: 600,
            readiness_min_secs: 10,
            readiness_max_secs: 60,
            launch_script: default_launch_script().to_string(),
            project_dir: "kourichat".to_string(),
            project_dir_hints: vec![
                "kourichat".to_string(),
                "kouri".to_string(),
                "exploration".to_string(),
            ],
        }
    }
}

fn default_launch_script() -> &'static str {
    if cfg!(windows) {
        "run.bat"
    } else {
        "run.sh"
    }
}

impl Settings {
    /// The application directory, defaulting to the executable's directory.
    pub fn app_dir(&self) -> PathBuf {
        self.app_dir.clone().unwrap_or_else(application_dir)
    }

    /// The downloads directory.
    pub fn downloads_dir(&self) -> PathBuf {
        self.downloads_dir
            .clone()
            .unwrap_or_else(|| self.app_dir().join(DOWNLOADS_DIR_NAME))
    }

    /// The local manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.app_dir().join(MANIFEST_FILE_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn readiness_min(&self) -> Duration {
        Duration::from_secs(self.readiness_min_secs)
    }

    pub fn readiness_max(&self) -> Duration {
        Duration::from_secs(self.readiness_max_secs)
    }

    /// Apply command-line (or environment) overrides on top of file values.
    ///
    /// A manifest URL given here is tried before the ones from the file.
    pub fn apply_overrides(&mut self, app_dir: Option<&Path>, manifest_url: Option<&str>) {
        if let Some(dir) = app_dir {
            self.app_dir = Some(dir.to_path_buf());
        }
        if let Some(url) = manifest_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.manifest_urls.retain(|existing| existing != url);
            self.manifest_urls.insert(0, url.to_string());
        }
    }

    /// Reject values that can't produce a sensible run.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("request_timeout_secs", self.request_timeout_secs),
            ("manifest_timeout_secs", self.manifest_timeout_secs),
            ("install_timeout_secs", self.install_timeout_secs),
            ("readiness_max_secs", self.readiness_max_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ProvisionError::ConfigValidationError {
                message: format!("{} must be greater than zero", name),
            });
        }

        if self.readiness_min_secs > self.readiness_max_secs {
            return Err(ProvisionError::ConfigValidationError {
                message: format!(
                    "readiness_min_secs ({}) exceeds readiness_max_secs ({})",
                    self.readiness_min_secs, self.readiness_max_secs
                ),
            });
        }

        if self.launch_script.trim().is_empty() {
            return Err(ProvisionError::ConfigValidationError {
                message: "launch_script must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
