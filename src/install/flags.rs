//! Silent-install command lines.

use std::path::Path;
use std::time::Duration;

use crate::shell::{program_name, CommandSpec};

/// Unattended flags for installers we know by name.
const KNOWN_INSTALLERS: &[(&str, &[&str])] = &[
    ("WeChatSetup.exe", &["/S"]),
    (
        "python-3.11.9-amd64.exe",
        &[
            "/quiet",
            "InstallAllUsers=1",
            "PrependPath=1",
            "Include_test=0",
            "Include_launcher=1",
            "Include_tcltk=1",
            "Include_pip=1",
            "Include_doc=0",
        ],
    ),
];

/// Flags for `name`; unknown installers get none.
pub fn silent_flags(name: &str) -> &'static [&'static str] {
    KNOWN_INSTALLERS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, flags)| *flags)
        .unwrap_or(&[])
}

/// Whether `name` has an entry in the flag table.
pub fn is_known_installer(name: &str) -> bool {
    KNOWN_INSTALLERS
        .iter()
        .any(|(known, _)| known.eq_ignore_ascii_case(name))
}

/// Command that installs `path` unattended, bounded by `timeout`.
///
/// MSI packages go through `msiexec`; everything else is run directly.
pub fn install_command(path: &Path, timeout: Duration) -> CommandSpec {
    let name = program_name(path);
    let spec = if name.to_ascii_lowercase().ends_with(".msi") {
        CommandSpec::new("msiexec")
            .arg("/i")
            .arg(path.display().to_string())
            .args(["/qn", "/norestart"])
    } else {
        CommandSpec::new(path).args(silent_flags(&name).iter().copied())
    };

    let spec = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => spec.cwd(dir),
        _ => spec,
    };
    spec.timeout(timeout)
}
