//! Probe backed by the real host.

use std::path::PathBuf;
use std::time::Duration;

use super::store::{Hive, StoredValue, VersionStore};
use super::version::{
    decode_packed_version, messenger_suitable, parse_runtime_output, runtime_suitable,
};
use super::{Prerequisite, PrerequisiteState, SystemProbe};
use crate::shell::{self, CommandSpec, ProcessRunner};

/// Ceiling for `python --version`.
pub const VERSION_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const RUNTIME_REGISTRY_KEY: &str = "Software\\Python\\PythonCore";
const MESSENGER_REGISTRY_KEY: &str = "Software\\Tencent\\WeChat";

/// The command used to detect the runtime and confirm it is reachable.
pub fn runtime_version_command() -> CommandSpec {
    CommandSpec::new("python")
        .arg("--version")
        .timeout(VERSION_COMMAND_TIMEOUT)
}

/// Where the messenger executable is usually installed.
pub fn known_messenger_paths() -> Vec<PathBuf> {
    ["ProgramFiles", "ProgramFiles(x86)", "APPDATA", "LOCALAPPDATA"]
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(|root| {
            PathBuf::from(root)
                .join("Tencent")
                .join("WeChat")
                .join("WeChat.exe")
        })
        .collect()
}

/// [`SystemProbe`] that runs commands and reads persisted state.
pub struct HostProbe<'a> {
    runner: &'a dyn ProcessRunner,
    store: &'a dyn VersionStore,
    messenger_paths: Vec<PathBuf>,
}

impl<'a> HostProbe<'a> {
    /// Create a probe using the usual messenger install locations.
    pub fn new(runner: &'a dyn ProcessRunner, store: &'a dyn VersionStore) -> Self {
        Self {
            runner,
            store,
            messenger_paths: known_messenger_paths(),
        }
    }

    /// Override the messenger install locations.
    pub fn with_messenger_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.messenger_paths = paths;
        self
    }

    fn check_runtime(&self) -> PrerequisiteState {
        let mut state = PrerequisiteState::absent();

        match self.runner.run(&runtime_version_command()) {
            Ok(result) if result.success => {
                state.on_search_path = true;
                // Older interpreters print the version on stderr.
                state.detected_version = parse_runtime_output(&result.stdout)
                    .or_else(|| parse_runtime_output(&result.stderr));
            }
            Ok(result) => {
                tracing::debug!("python --version exited with {:?}", result.exit_code)
            }
            Err(e) => tracing::debug!("{}", e),
        }

        if let Some(version) = &state.detected_version {
            state.suitable_version_present = runtime_suitable(version);
            tracing::debug!(
                "Runtime {} on PATH (suitable: {})",
                version,
                state.suitable_version_present
            );
            return state;
        }

        let mut seen: Vec<String> = Vec::new();
        for hive in [Hive::CurrentUser, Hive::LocalMachine] {
            for key in self.store.subkeys(hive, RUNTIME_REGISTRY_KEY) {
                if !seen.contains(&key) {
                    seen.push(key);
                }
            }
        }

        if let Some(version) = seen.into_iter().find(|v| runtime_suitable(v)) {
            tracing::debug!("Runtime {} registered but not on PATH", version);
            state.suitable_version_present = true;
            state.detected_version = Some(version);
        }
        state
    }

    fn check_messenger(&self) -> PrerequisiteState {
        let registered = self
            .store
            .value(Hive::CurrentUser, MESSENGER_REGISTRY_KEY, "Version")
            .map(|value| match value {
                StoredValue::Dword(raw) => decode_packed_version(raw),
                StoredValue::Text(text) => text.trim().to_string(),
            })
            .filter(|v| !v.is_empty());

        let version = registered.or_else(|| {
            self.messenger_paths
                .iter()
                .find_map(|path| self.store.file_version(path))
        });

        match version {
            Some(version) => {
                let suitable = messenger_suitable(&version);
                tracing::debug!("Messenger {} detected (suitable: {})", version, suitable);
                PrerequisiteState::found(&version, suitable, true)
            }
            None => PrerequisiteState::absent(),
        }
    }
}

impl SystemProbe for HostProbe<'_> {
    fn check(&self, prerequisite: Prerequisite) -> PrerequisiteState {
        match prerequisite {
            Prerequisite::Runtime => self.check_runtime(),
            Prerequisite::Messenger => self.check_messenger(),
        }
    }

    fn has_elevated_privileges(&self) -> bool {
        shell::is_elevated(self.runner)
    }
}
