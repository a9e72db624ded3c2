//! Settings loading.
//!
//! Settings are layered: built-in defaults, then an optional YAML file
//! (`--config` or `<app_dir>/hostprep.yml`), then command-line flags and
//! their environment fallbacks.

pub mod loader;
pub mod settings;

pub use loader::{
    find_settings_file, load_settings, load_settings_file, parse_settings, SETTINGS_FILE_NAME,
};
pub use settings::{Settings, DOWNLOADS_DIR_NAME, MANIFEST_FILE_NAME};
