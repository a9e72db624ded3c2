//! Artifact integrity checks.
//!
//! A declared checksum is compared case-insensitively against a streamed
//! digest of the file. Manifests carry MD5 digests; a 64-digit checksum is
//! treated as SHA-256. Without a checksum, any non-empty file passes.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_BUF: usize = 8192;

/// Digest algorithm implied by a checksum's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha256,
}

impl ChecksumKind {
    /// Pick the algorithm for `checksum` (64 hex digits ⇒ SHA-256, else MD5).
    pub fn for_checksum(checksum: &str) -> Self {
        if checksum.trim().len() == 64 {
            ChecksumKind::Sha256
        } else {
            ChecksumKind::Md5
        }
    }
}

/// Check whether `path` holds a usable artifact.
///
/// Never errors: any I/O failure counts as a mismatch.
pub fn verify(path: &Path, expected_checksum: &str) -> bool {
    let expected = expected_checksum.trim();

    let metadata = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return false,
    };

    if expected.is_empty() {
        return metadata.len() > 0;
    }

    match file_digest(path, ChecksumKind::for_checksum(expected)) {
        Ok(actual) => {
            let matches = actual.eq_ignore_ascii_case(expected);
            if !matches {
                tracing::debug!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    path.display(),
                    expected,
                    actual
                );
            }
            matches
        }
        Err(e) => {
            tracing::warn!("Failed to hash {}: {}", path.display(), e);
            false
        }
    }
}

/// Lowercase hex digest of the file at `path`.
pub fn file_digest(path: &Path, kind: ChecksumKind) -> io::Result<String> {
    let mut file = File::open(path)?;
    match kind {
        ChecksumKind::Md5 => {
            use md5::{Digest, Md5};
            let mut hasher = Md5::new();
            stream(&mut file, |chunk| hasher.update(chunk))?;
            Ok(hex::encode(hasher.finalize()))
        }
        ChecksumKind::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            stream(&mut file, |chunk| hasher.update(chunk))?;
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

fn stream<R: Read>(reader: &mut R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buf = [0u8; READ_BUF];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        update(&buf[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // md5("hello world") / sha256("hello world")
    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write(temp: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = temp.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn empty_checksum_accepts_non_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "a.bin", b"x");
        assert!(verify(&path, ""));
    }

    #[test]
    fn empty_checksum_rejects_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "a.bin", b"");
        assert!(!verify(&path, ""));
    }

    #[test]
    fn missing_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(!verify(&temp.path().join("nope.bin"), ""));
        assert!(!verify(&temp.path().join("nope.bin"), HELLO_MD5));
    }

    #[test]
    fn directory_fails() {
        let temp = TempDir::new().unwrap();
        assert!(!verify(temp.path(), ""));
    }

    #[test]
    fn md5_match_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "hello.txt", b"hello world");
        assert!(verify(&path, HELLO_MD5));
        assert!(verify(&path, &HELLO_MD5.to_uppercase()));
    }

    #[test]
    fn md5_mismatch_fails() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "hello.txt", b"hello world!");
        assert!(!verify(&path, HELLO_MD5));
    }

    #[test]
    fn sha256_checksum_is_detected_by_length() {
        let temp = TempDir::new().unwrap();
        let path = write(&temp, "hello.txt", b"hello world");
        assert_eq!(ChecksumKind::for_checksum(HELLO_SHA256), ChecksumKind::Sha256);
        assert!(verify(&path, HELLO_SHA256));
    }

    #[test]
    fn digest_streams_large_files() {
        let temp = TempDir::new().unwrap();
        let content = vec![7u8; READ_BUF * 3 + 17];
        let path = write(&temp, "big.bin", &content);
        let digest = file_digest(&path, ChecksumKind::Md5).unwrap();
        assert_eq!(digest.len(), 32);
        assert!(verify(&path, &digest));
    }
}
