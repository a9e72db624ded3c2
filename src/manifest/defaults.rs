//! Built-in manifest used when no local manifest can be read.

use super::schema::{Manifest, PackageRecord};

/// Runtime installer shipped by the built-in manifest.
pub const RUNTIME_INSTALLER: &str = "python-3.11.9-amd64.exe";

/// Messenger installer shipped by the built-in manifest.
pub const MESSENGER_INSTALLER: &str = "WeChatSetup.exe";

/// The manifest compiled into the binary.
pub fn builtin_manifest() -> Manifest {
    Manifest {
        version: "builtin".to_string(),
        base_url: String::new(),
        packages: vec![
            PackageRecord {
                description: "Python 3.11.9 installer".to_string(),
                ..PackageRecord::new(
                    RUNTIME_INSTALLER,
                    "https://www.python.org/ftp/python/3.11.9/python-3.11.9-amd64.exe",
                )
                .with_size(26_214_400)
            },
            PackageRecord {
                description: "WeChat installer".to_string(),
                ..PackageRecord::new(
                    MESSENGER_INSTALLER,
                    "https://dldir1.qq.com/weixin/Windows/WeChatSetup.exe",
                )
                .with_size(157_286_400)
            },
        ],
    }
}
