//! HTTP client construction.

use std::time::Duration;

use crate::error::{ProvisionError, Result};

/// Some download mirrors reject requests without a browser User-Agent.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Build a blocking client with a browser User-Agent and the given timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .map_err(|e| {
            ProvisionError::Other(anyhow::anyhow!("Failed to create HTTP client: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_with_timeout() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
