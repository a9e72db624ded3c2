//! Download source labelling, for diagnostics only.

use std::fmt;

/// Rough classification of who hosts a download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceProvider {
    ObjectStorage,
    CodeHosting,
    RuntimeVendor,
    MessengerVendor,
    Other,
}

impl SourceProvider {
    /// Classify `url` by substring match on well-known hosts.
    pub fn classify(url: &str) -> Self {
        let url = url.to_ascii_lowercase();
        if url.contains("aliyuncs.com") || url.contains("huaweicloud.com") {
            SourceProvider::ObjectStorage
        } else if url.contains("github.com") || url.contains("githubusercontent.com") {
            SourceProvider::CodeHosting
        } else if url.contains("python.org") {
            SourceProvider::RuntimeVendor
        } else if url.contains("qq.com") || url.contains("weixin") {
            SourceProvider::MessengerVendor
        } else {
            SourceProvider::Other
        }
    }
}

impl fmt::Display for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SourceProvider::ObjectStorage => "object storage",
            SourceProvider::CodeHosting => "code hosting",
            SourceProvider::RuntimeVendor => "runtime vendor",
            SourceProvider::MessengerVendor => "messenger vendor",
            SourceProvider::Other => "other",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_hosts() {
        assert_eq!(
            SourceProvider::classify("https://krc.oss-cn-nanjing.aliyuncs.com/a.zip"),
            SourceProvider::ObjectStorage
        );
        assert_eq!(
            SourceProvider::classify("https://github.com/org/repo/releases/download/v1/a.zip"),
            SourceProvider::CodeHosting
        );
        assert_eq!(
            SourceProvider::classify("https://www.python.org/ftp/python/3.11.9/x.exe"),
            SourceProvider::RuntimeVendor
        );
        assert_eq!(
            SourceProvider::classify("https://dldir1.qq.com/weixin/Windows/WeChatSetup.exe"),
            SourceProvider::MessengerVendor
        );
        assert_eq!(
            SourceProvider::classify("http://127.0.0.1:8080/a.bin"),
            SourceProvider::Other
        );
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(SourceProvider::CodeHosting.to_string(), "code hosting");
    }
}
