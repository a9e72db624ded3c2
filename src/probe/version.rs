//! Version parsing and suitability rules.

use regex::Regex;
use std::sync::LazyLock;

/// Version in `python --version` output.
static RUNTIME_OUTPUT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Python (\d+\.\d+\.\d+)").expect("RUNTIME_OUTPUT_REGEX must compile")
});

/// Purely numeric dotted version.
static DOTTED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)*$").expect("DOTTED_REGEX must compile"));

/// Extract `X.Y.Z` from `python --version` output.
pub fn parse_runtime_output(output: &str) -> Option<String> {
    RUNTIME_OUTPUT_REGEX
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Major and minor components of a dotted numeric version.
///
/// Returns `None` unless `version` is purely `digits(.digits)*`. A missing
/// minor component reads as 0.
pub fn major_minor(version: &str) -> Option<(u32, u32)> {
    let version = version.trim();
    if !DOTTED_REGEX.is_match(version) {
        return None;
    }
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map(|m| m.parse::<u32>())
        .transpose()
        .ok()?
        .unwrap_or(0);
    Some((major, minor))
}

/// Runtime versions 3.0 through 3.11 are supported. Unparseable is not.
pub fn runtime_suitable(version: &str) -> bool {
    matches!(major_minor(version), Some((3, minor)) if minor <= 11)
}

/// Messenger versions below 4 are supported except 3.0 through 3.8.
///
/// Anything that doesn't parse as a dotted number is accepted.
pub fn messenger_suitable(version: &str) -> bool {
    match major_minor(version) {
        Some((major, minor)) => major < 3 || (major == 3 && minor >= 9),
        None => true,
    }
}

/// Decode a registry DWORD holding `major.minor.patch.build` one byte each.
///
/// Installers write a marker into the high byte, so a major above 10 is
/// read as 3.
pub fn decode_packed_version(raw: u32) -> String {
    let mut major = (raw >> 24) & 0xFF;
    let minor = (raw >> 16) & 0xFF;
    let patch = (raw >> 8) & 0xFF;
    let build = raw & 0xFF;
    if major > 10 {
        major = 3;
    }
    format!("{}.{}.{}.{}", major, minor, patch, build)
}
