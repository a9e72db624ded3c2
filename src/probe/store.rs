//! Access to persisted installation state.
//!
//! On Windows this is the registry plus executable version resources, read
//! through `reg query` and PowerShell. Other platforms have no such store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shell::{CommandSpec, ProcessRunner};

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hive {
    CurrentUser,
    LocalMachine,
}

impl Hive {
    /// Short name accepted by `reg`.
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
        }
    }
}

/// A typed registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Dword(u32),
    Text(String),
}

/// Read-only view of persisted installation metadata.
pub trait VersionStore {
    /// Names of the immediate subkeys of `key`.
    fn subkeys(&self, hive: Hive, key: &str) -> Vec<String>;

    /// A named value under `key`.
    fn value(&self, hive: Hive, key: &str, name: &str) -> Option<StoredValue>;

    /// Version resource of the executable at `path`, if it exists.
    fn file_version(&self, path: &Path) -> Option<String>;
}

/// A store with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyStore;

impl VersionStore for EmptyStore {
    fn subkeys(&self, _hive: Hive, _key: &str) -> Vec<String> {
        Vec::new()
    }

    fn value(&self, _hive: Hive, _key: &str, _name: &str) -> Option<StoredValue> {
        None
    }

    fn file_version(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Reads the Windows registry with `reg query` and file versions with PowerShell.
pub struct RegQueryStore<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> RegQueryStore<'a> {
    /// Create a store that shells out through `runner`.
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }

    fn query(&self, args: Vec<String>) -> Option<String> {
        let spec = CommandSpec::new("reg").args(args).timeout(QUERY_TIMEOUT);
        match self.runner.run(&spec) {
            Ok(result) if result.success => Some(result.stdout),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("{}", e);
                None
            }
        }
    }
}

impl VersionStore for RegQueryStore<'_> {
    fn subkeys(&self, hive: Hive, key: &str) -> Vec<String> {
        let full = format!("{}\\{}", hive.short_name(), key);
        self.query(vec!["query".to_string(), full])
            .map(|out| parse_subkeys(&out, key))
            .unwrap_or_default()
    }

    fn value(&self, hive: Hive, key: &str, name: &str) -> Option<StoredValue> {
        let full = format!("{}\\{}", hive.short_name(), key);
        let out = self.query(vec![
            "query".to_string(),
            full,
            "/v".to_string(),
            name.to_string(),
        ])?;
        parse_value(&out, name)
    }

    fn file_version(&self, path: &Path) -> Option<String> {
        if !path.is_file() {
            return None;
        }
        let literal = path.display().to_string().replace('\'', "''");
        let script = format!(
            "(Get-Item -LiteralPath '{}').VersionInfo.FileVersion",
            literal
        );
        let spec = CommandSpec::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(script)
            .timeout(QUERY_TIMEOUT);
        let result = self.runner.run(&spec).ok()?;
        if !result.success {
            return None;
        }
        result
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }
}

/// Fixed contents, for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    subkeys: HashMap<(Hive, String), Vec<String>>,
    values: HashMap<(Hive, String, String), StoredValue>,
    files: HashMap<PathBuf, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subkey under `key`.
    pub fn with_subkey(mut self, hive: Hive, key: &str, subkey: &str) -> Self {
        self.subkeys
            .entry((hive, key.to_string()))
            .or_default()
            .push(subkey.to_string());
        self
    }

    /// Set a value under `key`.
    pub fn with_value(mut self, hive: Hive, key: &str, name: &str, value: StoredValue) -> Self {
        self.values
            .insert((hive, key.to_string(), name.to_string()), value);
        self
    }

    /// Set the version resource for `path`.
    pub fn with_file(mut self, path: impl Into<PathBuf>, version: &str) -> Self {
        self.files.insert(path.into(), version.to_string());
        self
    }
}

impl VersionStore for MemoryStore {
    fn subkeys(&self, hive: Hive, key: &str) -> Vec<String> {
        self.subkeys
            .get(&(hive, key.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn value(&self, hive: Hive, key: &str, name: &str) -> Option<StoredValue> {
        self.values
            .get(&(hive, key.to_string(), name.to_string()))
            .cloned()
    }

    fn file_version(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Subkey names from `reg query <key>` output.
///
/// Child keys are printed as full paths one level below `key`; value lines
/// and the key's own line are ignored.
pub fn parse_subkeys(output: &str, key: &str) -> Vec<String> {
    let depth = key.split('\\').filter(|s| !s.is_empty()).count() + 2;
    output
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("HKEY_"))
        .filter(|l| l.split('\\').count() == depth)
        .filter_map(|l| l.rsplit('\\').next())
        .map(str::to_string)
        .collect()
}

/// A single value from `reg query <key> /v <name>` output.
pub fn parse_value(output: &str, name: &str) -> Option<StoredValue> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let field_name = fields.next()?;
        let kind = fields.next()?;
        if !field_name.eq_ignore_ascii_case(name) || !kind.starts_with("REG_") {
            return None;
        }
        let data: Vec<&str> = fields.collect();
        match kind {
            "REG_DWORD" => {
                let hex = data.first()?.trim_start_matches("0x");
                u32::from_str_radix(hex, 16).ok().map(StoredValue::Dword)
            }
            _ => Some(StoredValue::Text(data.join(" "))),
        }
    })
}
