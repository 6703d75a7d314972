//! Key authentication configuration.
//!
//! Provides [`KeyAuthConfig`] for configuring a verifier and the service that
//! hosts it. Values are loaded from environment variables.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::canonical::BodyUnescape;
use crate::replay::{DEFAULT_REPLAY_WINDOW_SECS, ReplayWindow};
use crate::verify::VerifierPolicy;
use crate::version::SchemaVersion;

/// Key authentication configuration.
///
/// # Examples
///
/// ```
/// use keyauth::config::KeyAuthConfig;
///
/// let config = KeyAuthConfig::default();
/// assert_eq!(config.replay_window_secs, 300);
/// assert!(config.allow_legacy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct KeyAuthConfig {
    /// Bind address for the server (e.g. `"0.0.0.0:8080"`).
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub gateway_listen: String,

    /// Maximum age (and future skew) of a request timestamp, in seconds.
    #[builder(default = DEFAULT_REPLAY_WINDOW_SECS)]
    pub replay_window_secs: u64,

    /// Whether unversioned (v0) signatures are accepted.
    #[builder(default = true)]
    pub allow_legacy: bool,

    /// Whether form values arrive backslash-quoted and must be unquoted.
    #[builder(default = false)]
    pub strip_slashes: bool,

    /// Whether requests nobody authenticated are refused.
    #[builder(default = true)]
    pub require_auth: bool,

    /// Path to a JSON array of credentials.
    #[builder(default, setter(strip_option))]
    pub credentials_file: Option<String>,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for KeyAuthConfig {
    fn default() -> Self {
        Self {
            gateway_listen: String::from("0.0.0.0:8080"),
            replay_window_secs: DEFAULT_REPLAY_WINDOW_SECS,
            allow_legacy: true,
            strip_slashes: false,
            require_auth: true,
            credentials_file: None,
            log_level: String::from("info"),
        }
    }
}

impl KeyAuthConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8080` |
    /// | `KEYAUTH_REPLAY_WINDOW_SECS` | `300` |
    /// | `KEYAUTH_ALLOW_LEGACY` | `true` |
    /// | `KEYAUTH_STRIP_SLASHES` | `false` |
    /// | `KEYAUTH_REQUIRE_AUTH` | `true` |
    /// | `KEYAUTH_CREDENTIALS_FILE` | *(unset)* |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("KEYAUTH_REPLAY_WINDOW_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                config.replay_window_secs = n;
            }
        }
        if let Ok(v) = std::env::var("KEYAUTH_ALLOW_LEGACY") {
            config.allow_legacy = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("KEYAUTH_STRIP_SLASHES") {
            config.strip_slashes = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("KEYAUTH_REQUIRE_AUTH") {
            config.require_auth = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("KEYAUTH_CREDENTIALS_FILE") {
            config.credentials_file = Some(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// The verification policy described by this configuration.
    #[must_use]
    pub fn policy(&self) -> VerifierPolicy {
        let supported_versions = if self.allow_legacy {
            SchemaVersion::ALL.to_vec()
        } else {
            vec![SchemaVersion::V1]
        };
        let body_unescape = if self.strip_slashes {
            BodyUnescape::StripSlashes
        } else {
            BodyUnescape::None
        };

        VerifierPolicy {
            replay_window: ReplayWindow::new(self.replay_window_secs),
            supported_versions,
            body_unescape,
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
