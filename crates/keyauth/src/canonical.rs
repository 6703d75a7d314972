//! Canonical message construction.
//!
//! Both the signing client and the verifier reduce a request to one
//! deterministic string before hashing it. The layout depends on the
//! [`SchemaVersion`]:
//!
//! ```text
//! v0: {"api_key":"…","timestamp":"…","request_method":"…","request_uri":"…"}
//!
//! v1: ApiKey\n
//!     Timestamp\n
//!     HTTPRequestMethod\n
//!     RequestURI\n
//!     NormalizedBody
//! ```
//!
//! v0 keeps fields in declaration order and takes the request URI verbatim, so
//! any difference in URI encoding between client and server breaks it. v1
//! additionally covers the form body, normalized so that key case and key
//! order do not matter.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::version::SchemaVersion;

/// Characters left unencoded in normalized body keys and values.
///
/// Everything except ASCII alphanumerics and `-`, `_`, `.` is percent-encoded;
/// spaces become `+` (see [`query_encode`]).
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// How to undo escaping that upstream request-parsing middleware applied to
/// form values before they reach the verifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyUnescape {
    /// Values arrive exactly as the client sent them.
    #[default]
    None,
    /// Values arrive backslash-quoted (`'` → `\'`, `\` → `\\`, NUL → `\0`).
    StripSlashes,
}

/// The request fields covered by a signature.
#[derive(Debug, Clone, Copy)]
pub struct RequestFields<'a> {
    /// The `X-API-Key` value.
    pub api_key: &'a str,
    /// The `X-API-Timestamp` header exactly as sent (used by v0).
    pub timestamp_raw: &'a str,
    /// The timestamp as integer Unix seconds (used by v1).
    pub timestamp: i64,
    /// The HTTP method.
    pub method: &'a str,
    /// Path and query exactly as received.
    pub uri: &'a str,
    /// Decoded form-body pairs in arrival order. Empty for non-form bodies.
    pub form_body: &'a [(String, String)],
}

#[derive(Serialize)]
struct LegacyFields<'a> {
    api_key: &'a str,
    timestamp: &'a str,
    request_method: &'a str,
    request_uri: &'a str,
}

/// Build the canonical message for `version`.
///
/// # Examples
///
/// ```
/// use keyauth::canonical::{BodyUnescape, RequestFields, build_canonical_message};
/// use keyauth::version::SchemaVersion;
///
/// let fields = RequestFields {
///     api_key: "asdf123",
///     timestamp_raw: "1700000000",
///     timestamp: 1_700_000_000,
///     method: "GET",
///     uri: "/wp-json/wp/v2/users/me",
///     form_body: &[],
/// };
/// let message = build_canonical_message(&fields, SchemaVersion::V1, BodyUnescape::None);
/// assert_eq!(message, "asdf123\n1700000000\nGET\n/wp-json/wp/v2/users/me\n");
/// ```
#[must_use]
pub fn build_canonical_message(
    fields: &RequestFields<'_>,
    version: SchemaVersion,
    unescape: BodyUnescape,
) -> String {
    match version {
        SchemaVersion::V0 => build_legacy_message(fields),
        SchemaVersion::V1 => {
            let body = normalize_body(fields.form_body, unescape);
            format!(
                "{}\n{}\n{}\n{}\n{body}",
                fields.api_key, fields.timestamp, fields.method, fields.uri
            )
        }
    }
}

/// Build the v0 message: a JSON object with four keys in fixed order.
///
/// # Examples
///
/// ```
/// use keyauth::canonical::{RequestFields, build_legacy_message};
///
/// let fields = RequestFields {
///     api_key: "asdf123",
///     timestamp_raw: "1700000000",
///     timestamp: 1_700_000_000,
///     method: "GET",
///     uri: "/wp-json/wp/v2/users/me",
///     form_body: &[],
/// };
/// assert_eq!(
///     build_legacy_message(&fields),
///     r#"{"api_key":"asdf123","timestamp":"1700000000","request_method":"GET","request_uri":"/wp-json/wp/v2/users/me"}"#
/// );
/// ```
#[must_use]
pub fn build_legacy_message(fields: &RequestFields<'_>) -> String {
    let legacy = LegacyFields {
        api_key: fields.api_key,
        timestamp: fields.timestamp_raw,
        request_method: fields.method,
        request_uri: fields.uri,
    };
    serde_json::to_string(&legacy).expect("a struct of string fields always serializes")
}

/// Normalize form-body pairs into a query string.
///
/// Keys are lower-cased, then entries are stably sorted by key (byte-wise), so
/// values sharing a key keep their original relative order. Keys and values
/// are re-encoded with [`query_encode`]. An empty body yields `""`.
///
/// # Examples
///
/// ```
/// use keyauth::canonical::{BodyUnescape, normalize_body};
///
/// let body = vec![
///     ("UVW".to_owned(), "xyz".to_owned()),
///     ("abc".to_owned(), "d e/f".to_owned()),
/// ];
/// assert_eq!(normalize_body(&body, BodyUnescape::None), "abc=d+e%2Ff&uvw=xyz");
/// assert_eq!(normalize_body(&[], BodyUnescape::None), "");
/// ```
#[must_use]
pub fn normalize_body(pairs: &[(String, String)], unescape: BodyUnescape) -> String {
    let mut entries: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| {
            let value = match unescape {
                BodyUnescape::None => value.clone(),
                BodyUnescape::StripSlashes => strip_slashes(value),
            };
            (key.to_ascii_lowercase(), value)
        })
        .collect();

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    entries
        .iter()
        .map(|(k, v)| format!("{}={}", query_encode(k), query_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode an `application/x-www-form-urlencoded` body into key/value pairs,
/// preserving arrival order.
///
/// Decoding is strict: a key or value that does not decode to valid UTF-8 is
/// an error rather than being replaced with U+FFFD, so two different bodies
/// can never normalize to the same string.
pub fn parse_form_body(body: &[u8]) -> Result<Vec<(String, String)>, AuthError> {
    body.split(|&b| b == b'&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut kv = segment.splitn(2, |&b| b == b'=');
            let key = kv.next().unwrap_or_default();
            let value = kv.next().unwrap_or_default();
            Ok((decode_form_component(key)?, decode_form_component(value)?))
        })
        .collect()
}

fn decode_form_component(raw: &[u8]) -> Result<String, AuthError> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let decoded: Vec<u8> = percent_decode(&spaced).collect();
    String::from_utf8(decoded).map_err(|_| AuthError::MalformedBody)
}

/// Encode a key or value for the normalized body: spaces become `+`, all
/// other bytes outside `[A-Za-z0-9_.-]` are percent-encoded.
#[must_use]
pub fn query_encode(input: &str) -> String {
    // A literal `%` is itself encoded as `%25`, so `%20` only ever comes from a space.
    utf8_percent_encode(input, QUERY_ENCODE_SET)
        .to_string()
        .replace("%20", "+")
}

/// Remove one level of backslash quoting.
fn strip_slashes(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('0') => result.push('\0'),
            Some(escaped) => result.push(escaped),
            None => {}
        }
    }
    result
}
