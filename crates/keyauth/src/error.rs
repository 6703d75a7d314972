//! Error types for key authentication.
//!
//! [`AuthError`] names the specific check that failed during verification. It
//! exists for diagnostics only: callers of
//! [`KeyAuthVerifier::authenticate`](crate::verify::KeyAuthVerifier::authenticate)
//! observe every variant as the same
//! [`AuthOutcome::Rejected`](crate::verify::AuthOutcome::Rejected), so the
//! response never tells a client which check it failed.

/// Errors that can occur while verifying a signed request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The API key does not resolve to a principal.
    #[error("API key not found: {0}")]
    UnknownKey(String),

    /// The principal exists but has no shared secret configured.
    #[error("no shared secret configured for principal {0}")]
    MissingSecret(String),

    /// The computed signature does not match the presented one.
    #[error("signature does not match")]
    SignatureMismatch,

    /// The request timestamp lies outside the replay window.
    #[error("request timestamp {timestamp} is outside the replay window (now {now})")]
    ExpiredTimestamp {
        /// The presented timestamp, in Unix seconds.
        timestamp: i64,
        /// The verifier's clock at the time of the check.
        now: i64,
    },

    /// The timestamp header is not an integer number of seconds.
    #[error("invalid timestamp header: {0:?}")]
    MalformedTimestamp(String),

    /// The version header names a schema this verifier does not implement
    /// or does not advertise.
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(String),

    /// A required authentication header is present but not valid text.
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),

    /// A form-encoded body does not decode to valid UTF-8.
    #[error("form body is not valid UTF-8 after decoding")]
    MalformedBody,

    /// The credential store could not answer; authentication fails closed.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

/// Failure reported by a [`CredentialStore`](crate::credentials::CredentialStore)
/// lookup, e.g. a backing database that is down or timed out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Create a store error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
