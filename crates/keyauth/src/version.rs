//! Signature schema versions and their negotiation.
//!
//! The client selects a schema through the `X-API-Version` header. A request
//! without the header uses the legacy [`SchemaVersion::V0`] rules so that
//! existing clients keep working.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// A canonicalization + hashing rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Legacy: ordered JSON object hashed with MD5(message ‖ secret).
    ///
    /// Not cryptographically recommended; only kept for existing clients.
    V0,
    /// Newline-joined fields with a normalized form body, HMAC-SHA256.
    V1,
}

impl SchemaVersion {
    /// Every version this crate implements, oldest first.
    pub const ALL: [Self; 2] = [Self::V0, Self::V1];

    /// Select the version from an optional `X-API-Version` header value.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyauth::version::SchemaVersion;
    ///
    /// assert_eq!(SchemaVersion::from_header(None).unwrap(), SchemaVersion::V0);
    /// assert_eq!(SchemaVersion::from_header(Some("1")).unwrap(), SchemaVersion::V1);
    /// assert!(SchemaVersion::from_header(Some("2")).is_err());
    /// ```
    pub fn from_header(value: Option<&str>) -> Result<Self, AuthError> {
        value.map_or(Ok(Self::V0), str::parse)
    }

    /// The value a client sends in `X-API-Version`, or `None` for the legacy
    /// schema, which is selected by omitting the header.
    #[must_use]
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Self::V0 => None,
            Self::V1 => Some("1"),
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Self::V0),
            "1" => Ok(Self::V1),
            other => Err(AuthError::UnsupportedVersion(other.to_owned())),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V0 => f.write_str("0"),
            Self::V1 => f.write_str("1"),
        }
    }
}
