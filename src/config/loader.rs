//! Settings file discovery and loading.

use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Settings;
use crate::error::{ProvisionError, Result};

/// Name of the settings file looked up in the application directory.
pub const SETTINGS_FILE_NAME: &str = "hostprep.yml";

/// Find the settings file in `app_dir`, if there is one.
pub fn find_settings_file(app_dir: &Path) -> Option<PathBuf> {
    let path = app_dir.join(SETTINGS_FILE_NAME);
    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Load settings for a run.
///
/// An explicit `config` path must exist. Without one, `<app_dir>/hostprep.yml`
/// is used when present, otherwise the defaults. The result is validated.
///
/// # Errors
///
/// Returns `ConfigNotFound` if an explicit file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
/// Returns `ConfigValidationError` if values conflict.
pub fn load_settings(config: Option<&Path>, app_dir: &Path) -> Result<Settings> {
    let path = match config {
        Some(path) => Some(path.to_path_buf()),
        None => find_settings_file(app_dir),
    };

    let settings = match path {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            load_settings_file(&path)?
        }
        None => Settings::default(),
    };

    settings.validate()?;
    Ok(settings)
}

/// Load a single settings file.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProvisionError::Io(e)
        }
    })?;

    parse_settings(&content, path)
}

/// Parse YAML settings. `source_path` is only used for error reporting.
pub fn parse_settings(content: &str, source_path: &Path) -> Result<Settings> {
    // An empty file deserializes as null, which means "all defaults".
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content).map_err(|e| ProvisionError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}
