//! Host inspection and per-prerequisite suitability verdicts.
//!
//! A [`SystemProbe`] answers, for each [`Prerequisite`], whether a suitable
//! version is already installed and reachable. Verdicts are computed fresh
//! on every run and never persisted.
//!
//! # Example
//!
//! ```
//! use hostprep::probe::{FixedProbe, Prerequisite, PrerequisiteState, SystemProbe};
//!
//! let probe = FixedProbe::new()
//!     .with(Prerequisite::Runtime, PrerequisiteState::found("3.11.9", true, true));
//! assert!(probe.check(Prerequisite::Runtime).is_satisfied());
//! assert!(!probe.check(Prerequisite::Messenger).is_satisfied());
//! ```

pub mod host;
pub mod store;
pub mod version;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub use host::{known_messenger_paths, runtime_version_command, HostProbe};
pub use store::{EmptyStore, Hive, MemoryStore, RegQueryStore, StoredValue, VersionStore};
pub use version::{decode_packed_version, messenger_suitable, runtime_suitable};

/// A program the pipeline may need to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    /// The scripting runtime (Python).
    Runtime,
    /// The messaging client (WeChat).
    Messenger,
}

impl Prerequisite {
    /// Every prerequisite, runtime first.
    pub const ALL: [Prerequisite; 2] = [Prerequisite::Runtime, Prerequisite::Messenger];

    /// Lowercase name fragments identifying this prerequisite's packages.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            Prerequisite::Runtime => &["python"],
            Prerequisite::Messenger => &["wechat", "微信"],
        }
    }

    /// The prerequisite a package installs, by name keyword.
    pub fn for_package(name: &str) -> Option<Prerequisite> {
        let lower = name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.keywords().iter().any(|k| lower.contains(k)))
    }
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Runtime => write!(f, "Python"),
            Prerequisite::Messenger => write!(f, "WeChat"),
        }
    }
}

/// What the probe found for one prerequisite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrerequisiteState {
    /// A version satisfying the suitability rule is installed.
    pub suitable_version_present: bool,
    /// The program is reachable the way the rest of the system uses it.
    pub on_search_path: bool,
    /// Version string as detected, if any.
    pub detected_version: Option<String>,
}

impl PrerequisiteState {
    /// Nothing detected.
    pub fn absent() -> Self {
        Self::default()
    }

    /// A detected version with its verdict.
    pub fn found(version: &str, suitable: bool, on_search_path: bool) -> Self {
        Self {
            suitable_version_present: suitable,
            on_search_path,
            detected_version: Some(version.to_string()),
        }
    }

    /// Installation can be skipped: suitable and reachable.
    pub fn is_satisfied(&self) -> bool {
        self.suitable_version_present && self.on_search_path
    }
}

/// Capability for inspecting the host.
pub trait SystemProbe {
    /// Verdict for `prerequisite`.
    fn check(&self, prerequisite: Prerequisite) -> PrerequisiteState;

    /// Whether the process runs with administrator/root privileges.
    fn has_elevated_privileges(&self) -> bool;
}

/// A probe with preset answers.
#[derive(Debug, Default, Clone)]
pub struct FixedProbe {
    states: HashMap<Prerequisite, PrerequisiteState>,
    elevated: bool,
}

impl FixedProbe {
    /// Probe reporting every prerequisite as absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset the verdict for `prerequisite`.
    pub fn with(mut self, prerequisite: Prerequisite, state: PrerequisiteState) -> Self {
        self.states.insert(prerequisite, state);
        self
    }

    /// Preset the privilege answer.
    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }
}

impl SystemProbe for FixedProbe {
    fn check(&self, prerequisite: Prerequisite) -> PrerequisiteState {
        self.states.get(&prerequisite).cloned().unwrap_or_default()
    }

    fn has_elevated_privileges(&self) -> bool {
        self.elevated
    }
}
