//! Finding and starting the provisioned project's launch script.
//!
//! Launching degrades step by step: elevated, then normal, then revealing the
//! script in a file manager, then asking the user to start it by hand. A
//! missing script is not an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::Settings;
use crate::progress::ProgressSink;
use crate::shell::{execute_check, reveal_command, CommandSpec, ProcessRunner};

/// How deep below each root the recursive search goes.
pub const MAX_SEARCH_DEPTH: usize = 6;

/// Ceiling for the elevation prompt.
const ELEVATION_TIMEOUT: Duration = Duration::from_secs(60);

/// How the launch script was started, if at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LaunchOutcome {
    /// Started with elevated privileges.
    Elevated { script: PathBuf },
    /// Started with the current privileges.
    Normal { script: PathBuf, pid: u32 },
    /// Could not be started; its folder was opened instead.
    Revealed { script: PathBuf },
    /// Could not be started or revealed; the user has to run it.
    Manual { script: PathBuf },
    /// No launch script was found.
    NotFound,
}

impl LaunchOutcome {
    /// Whether the script is running.
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            LaunchOutcome::Elevated { .. } | LaunchOutcome::Normal { .. }
        )
    }
}

/// Default search roots: the executable's directory, the application
/// directory and its parent, without duplicates.
pub fn default_roots(app_dir: &Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let candidates = [
        Some(crate::shell::application_dir()),
        Some(app_dir.to_path_buf()),
        app_dir.parent().map(Path::to_path_buf),
    ];
    for root in candidates.into_iter().flatten() {
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

/// Locates and starts the launch script.
pub struct ScriptLauncher<'a> {
    runner: &'a dyn ProcessRunner,
    sink: &'a dyn ProgressSink,
    script_name: String,
    project_dir: String,
    hints: Vec<String>,
    max_depth: usize,
}

impl<'a> ScriptLauncher<'a> {
    /// Create a launcher using the script and directory names from `settings`.
    pub fn new(
        runner: &'a dyn ProcessRunner,
        sink: &'a dyn ProgressSink,
        settings: &Settings,
    ) -> Self {
        Self {
            runner,
            sink,
            script_name: settings.launch_script.clone(),
            project_dir: settings.project_dir.clone(),
            hints: settings
                .project_dir_hints
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
            max_depth: MAX_SEARCH_DEPTH,
        }
    }

    /// Override the recursive search depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Find the script under `roots`, checked in order.
    ///
    /// For each root `<root>/<project_dir>/<script>` is checked first, then the
    /// tree is walked top-down. In each directory the script itself is
    /// checked before subdirectories whose names contain a hint.
    pub fn find_script(&self, roots: &[PathBuf]) -> Option<PathBuf> {
        for root in roots.iter().filter(|r| r.is_dir()) {
            tracing::debug!("Searching {} for {}", root.display(), self.script_name);

            let preferred = root.join(&self.project_dir).join(&self.script_name);
            if preferred.is_file() {
                return Some(preferred);
            }
            if let Some(found) = self.walk(root, 0) {
                return Some(found);
            }
        }
        None
    }

    fn walk(&self, dir: &Path, depth: usize) -> Option<PathBuf> {
        let candidate = dir.join(&self.script_name);
        if candidate.is_file() {
            return Some(candidate);
        }

        let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        subdirs.sort();

        let hinted = subdirs.iter().find_map(|sub| {
            let name = sub.file_name()?.to_string_lossy().to_lowercase();
            let script = sub.join(&self.script_name);
            (self.hints.iter().any(|h| name.contains(h.as_str())) && script.is_file())
                .then_some(script)
        });
        if hinted.is_some() {
            return hinted;
        }

        if depth >= self.max_depth {
            return None;
        }
        subdirs.iter().find_map(|sub| self.walk(sub, depth + 1))
    }

    /// Search `roots` and launch what is found.
    pub fn find_and_launch(&self, roots: &[PathBuf]) -> LaunchOutcome {
        self.sink.stage(98.0, "Looking for launch script");
        match self.find_script(roots) {
            Some(script) => self.launch(&script),
            None => {
                tracing::info!("No {} found", self.script_name);
                self.sink
                    .detail(&format!("{} not found; provisioning complete", self.script_name));
                LaunchOutcome::NotFound
            }
        }
    }

    /// Start `script`, degrading from elevated to manual.
    pub fn launch(&self, script: &Path) -> LaunchOutcome {
        let script = script.to_path_buf();
        tracing::info!("Launching {}", script.display());
        self.sink.stage(99.0, "Starting project");

        if self.launch_elevated(&script) {
            self.sink.stage(100.0, "Project started");
            self.sink.detail("Started with administrator privileges");
            return LaunchOutcome::Elevated { script };
        }
        self.sink
            .detail("Could not start with administrator privileges; trying normally");

        match self.runner.spawn(&normal_command(&script)) {
            Ok(pid) => {
                self.sink.stage(100.0, "Project started");
                self.sink.detail(&format!("Started {} (pid {})", script.display(), pid));
                return LaunchOutcome::Normal { script, pid };
            }
            Err(e) => tracing::warn!("Normal launch failed: {}", e),
        }

        if execute_check(self.runner, &reveal_command(&script)) {
            self.sink.detail(&format!(
                "Could not start {}; its folder was opened, please run it manually",
                script.display()
            ));
            return LaunchOutcome::Revealed { script };
        }

        self.sink
            .detail(&format!("Please start {} manually", script.display()));
        LaunchOutcome::Manual { script }
    }

    fn launch_elevated(&self, script: &Path) -> bool {
        if cfg!(windows) {
            execute_check(self.runner, &elevated_command(script))
        } else {
            // Without cached credentials sudo would prompt; -n makes it fail instead.
            let probe = CommandSpec::new("sudo")
                .args(["-n", "true"])
                .timeout(Duration::from_secs(5));
            execute_check(self.runner, &probe)
                && self.runner.spawn(&elevated_command(script)).is_ok()
        }
    }
}

fn script_dir(script: &Path) -> PathBuf {
    script
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Command that starts `script` with elevated privileges.
pub fn elevated_command(script: &Path) -> CommandSpec {
    let dir = script_dir(script);
    if cfg!(windows) {
        let command = format!(
            "Start-Process -FilePath '{}' -WorkingDirectory '{}' -Verb RunAs",
            script.display(),
            dir.display()
        );
        CommandSpec::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(command)
            .timeout(ELEVATION_TIMEOUT)
    } else {
        CommandSpec::new("sudo")
            .args(["-n", "sh"])
            .arg(script.display().to_string())
            .cwd(dir)
            .visible()
    }
}

/// Command that starts `script` in its own directory.
pub fn normal_command(script: &Path) -> CommandSpec {
    let dir = script_dir(script);
    let spec = if cfg!(windows) {
        CommandSpec::new("cmd")
            .arg("/c")
            .arg(script.display().to_string())
    } else {
        CommandSpec::new("sh").arg(script.display().to_string())
    };
    spec.cwd(dir).visible()
}
