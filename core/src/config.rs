//! Client configuration.
//!
//! A `ClientConfig` is validated once when a `RecEngClient` is constructed
//! and never changes afterwards. It deserializes with defaults so it can be
//! embedded in an application's own configuration file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Longest timeout actually applied. Larger settings are accepted and clamped.
pub const MAX_TIMEOUT_SECONDS: i64 = 24 * 60 * 60;

/// Connection settings for the remote engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub remote_url: String,
    /// Applied to connection setup and to the whole call.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    /// Only relevant for `https` URLs.
    #[serde(default = "default_verify_peer_tls")]
    pub verify_peer_tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_timeout_seconds() -> i64 {
    3
}

fn default_verify_peer_tls() -> bool {
    true
}

impl ClientConfig {
    pub fn new(remote_url: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            timeout_seconds: default_timeout_seconds(),
            verify_peer_tls: default_verify_peer_tls(),
            user: None,
            password: None,
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: i64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_verify_peer_tls(mut self, verify: bool) -> Self {
        self.verify_peer_tls = verify;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.remote_url.trim().is_empty() {
            return Err(ClientError::Config("remoteUrl must not be empty".to_string()));
        }
        if self.timeout_seconds <= 0 {
            return Err(ClientError::Config(format!(
                "timeoutSeconds must be positive, got {}",
                self.timeout_seconds
            )));
        }
        Ok(())
    }

    /// Timeout as a `Duration`, clamped to `MAX_TIMEOUT_SECONDS`. Only
    /// meaningful after `validate` succeeded.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.clamp(0, MAX_TIMEOUT_SECONDS) as u64)
    }

    /// `remote_url` without surrounding whitespace or a trailing slash.
    pub fn base_url(&self) -> &str {
        self.remote_url.trim().trim_end_matches('/')
    }

    pub fn is_secure(&self) -> bool {
        self.base_url()
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }
}
