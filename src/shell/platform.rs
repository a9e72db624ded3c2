//! Platform detection helpers.

use std::path::PathBuf;
use std::time::Duration;

use super::command::{CommandSpec, ProcessRunner};

/// Directory holding the running executable.
///
/// Falls back to the per-user data directory, then the current directory,
/// when the executable path can't be determined.
pub fn application_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .or_else(|| dirs::data_local_dir().map(|d| d.join("hostprep")))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Check if running in a CI environment.
///
/// Checks common CI environment variables: `CI`, `GITHUB_ACTIONS`,
/// `GITLAB_CI`, `CIRCLECI`, `TRAVIS`, `JENKINS_URL`.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}

/// Check if running as root/admin.
///
/// On Windows `net session` only succeeds from an elevated token. Any
/// failure to query counts as not elevated.
pub fn is_elevated(runner: &dyn ProcessRunner) -> bool {
    #[cfg(unix)]
    {
        let _ = runner;
        // SAFETY: geteuid() is a simple syscall that returns the effective user ID
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(windows)]
    {
        let spec = CommandSpec::new("net")
            .arg("session")
            .timeout(Duration::from_secs(10));
        super::command::execute_check(runner, &spec)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = runner;
        false
    }
}

/// Command that opens a file manager with `path` selected (or its folder).
pub fn reveal_command(path: &std::path::Path) -> CommandSpec {
    let spec = if cfg!(target_os = "windows") {
        CommandSpec::new("explorer").arg(format!("/select,{}", path.display()))
    } else if cfg!(target_os = "macos") {
        CommandSpec::new("open")
            .arg("-R")
            .arg(path.display().to_string())
    } else {
        let dir = path.parent().unwrap_or(path);
        CommandSpec::new("xdg-open").arg(dir.display().to_string())
    };
    spec.visible().timeout(Duration::from_secs(15))
}

/// Advice shown when provisioning without elevated privileges.
pub fn elevation_hint() -> &'static str {
    if cfg!(target_os = "windows") {
        "Re-run from an elevated prompt if an installer fails."
    } else {
        "Re-run with sudo if a system-wide install fails."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::mock::MockRunner;
    use std::path::Path;

    #[test]
    fn application_dir_is_not_empty() {
        assert!(!application_dir().as_os_str().is_empty());
    }

    #[test]
    fn is_ci_detects_environment() {
        // Just ensure function doesn't panic
        let _ = is_ci();
    }

    #[test]
    fn is_elevated_never_panics_with_failing_runner() {
        let _ = is_elevated(&MockRunner::new());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reveal_opens_parent_folder_on_linux() {
        let spec = reveal_command(Path::new("/opt/app/run.sh"));
        assert_eq!(spec.program, Path::new("xdg-open"));
        assert_eq!(spec.args, vec!["/opt/app".to_string()]);
    }

    #[test]
    fn elevation_hint_suggests_rerun() {
        assert!(elevation_hint().starts_with("Re-run"));
    }
}
