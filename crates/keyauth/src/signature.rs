//! Signature computation and comparison.
//!
//! ```text
//! v0: hex(MD5(CanonicalMessage ‖ SharedSecret))
//! v1: hex(HMAC-SHA256(SharedSecret, CanonicalMessage))
//! ```
//!
//! v0 is a plain, unkeyed hash and is only implemented so that existing
//! clients keep working. New integrations should sign with v1.

use hmac::{Hmac, KeyInit, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::credentials::SharedSecret;
use crate::version::SchemaVersion;

type HmacSha256 = Hmac<Sha256>;

/// Compute the lowercase hex signature of `canonical` for `version`.
///
/// # Examples
///
/// ```
/// use keyauth::credentials::SharedSecret;
/// use keyauth::signature::compute_signature;
/// use keyauth::version::SchemaVersion;
///
/// let secret = SharedSecret::new("key");
/// let sig = compute_signature(
///     "The quick brown fox jumps over the lazy dog",
///     &secret,
///     SchemaVersion::V1,
/// );
/// assert_eq!(sig, "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8");
/// ```
#[must_use]
pub fn compute_signature(canonical: &str, secret: &SharedSecret, version: SchemaVersion) -> String {
    match version {
        SchemaVersion::V0 => legacy_digest(canonical, secret.expose()),
        SchemaVersion::V1 => hmac_sha256_hex(secret.expose().as_bytes(), canonical.as_bytes()),
    }
}

/// Compare a presented signature against the expected one in constant time.
#[must_use]
pub fn signatures_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// MD5 over the message followed by the secret.
fn legacy_digest(message: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(message.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}
