//! Replay-window enforcement.
//!
//! A validly signed request that was captured in transit must not stay usable
//! forever. [`ReplayWindow`] bounds how far the presented `X-API-Timestamp`
//! may lie from the verifier's clock, in either direction.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Default maximum request age, in seconds.
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;

/// Maximum allowed distance between a request timestamp and "now".
///
/// # Examples
///
/// ```
/// use keyauth::replay::ReplayWindow;
///
/// let window = ReplayWindow::default();
/// assert!(window.check(1_000, 1_299).is_ok());
/// assert!(window.check(1_000, 1_301).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayWindow {
    max_age_secs: u64,
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW_SECS)
    }
}

impl ReplayWindow {
    /// Create a window accepting timestamps at most `max_age_secs` away from now.
    #[must_use]
    pub fn new(max_age_secs: u64) -> Self {
        Self { max_age_secs }
    }

    /// The configured bound, in seconds.
    #[must_use]
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_secs
    }

    /// Check `timestamp` against `now` (both Unix seconds). The bound itself
    /// is inclusive.
    pub fn check(&self, timestamp: i64, now: i64) -> Result<(), AuthError> {
        let skew = now.saturating_sub(timestamp).unsigned_abs();
        if skew > self.max_age_secs {
            return Err(AuthError::ExpiredTimestamp { timestamp, now });
        }
        Ok(())
    }
}

/// Parse an `X-API-Timestamp` header value as integer Unix seconds.
pub fn parse_timestamp(raw: &str) -> Result<i64, AuthError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AuthError::MalformedTimestamp(raw.to_owned()))
}

/// The current time in Unix seconds.
#[must_use]
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}
