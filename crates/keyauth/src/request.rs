//! Extraction of signed-request fields from an HTTP request.

use http::{HeaderMap, HeaderValue};
use http::header::CONTENT_TYPE;

use crate::canonical::{RequestFields, parse_form_body};
use crate::error::AuthError;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying the signing time in Unix seconds.
pub const TIMESTAMP_HEADER: &str = "x-api-timestamp";
/// Header carrying the hex signature.
pub const SIGNATURE_HEADER: &str = "x-api-signature";
/// Optional header selecting the schema version.
pub const VERSION_HEADER: &str = "x-api-version";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The authentication-relevant fields of one inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// The HTTP method.
    pub method: String,
    /// Path and query as received.
    pub uri: String,
    /// Decoded form-body pairs; empty unless the body is form-encoded.
    pub form_body: Vec<(String, String)>,
    /// The `X-API-Key` value.
    pub api_key: String,
    /// The raw `X-API-Timestamp` value.
    pub timestamp: String,
    /// The raw `X-API-Version` value, if sent.
    pub version: Option<String>,
    /// The `X-API-Signature` value.
    pub signature: String,
}

impl SignedRequest {
    /// Extract the signed fields from request parts and the collected body.
    ///
    /// Returns `Ok(None)` when any of the key, timestamp or signature headers
    /// is absent: the request is not using this scheme at all. Only once all
    /// three are present is a header that is not visible ASCII an error, as is
    /// a form body that does not decode to UTF-8.
    pub fn from_parts(
        parts: &http::request::Parts,
        body: &[u8],
    ) -> Result<Option<Self>, AuthError> {
        let headers = &parts.headers;
        let (Some(api_key), Some(timestamp), Some(signature)) = (
            headers.get(API_KEY_HEADER),
            headers.get(TIMESTAMP_HEADER),
            headers.get(SIGNATURE_HEADER),
        ) else {
            return Ok(None);
        };
        let api_key = header_text(api_key, API_KEY_HEADER)?;
        let timestamp = header_text(timestamp, TIMESTAMP_HEADER)?;
        let signature = header_text(signature, SIGNATURE_HEADER)?;
        let version = headers
            .get(VERSION_HEADER)
            .map(|v| header_text(v, VERSION_HEADER))
            .transpose()?;

        let uri = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());

        let form_body = if is_form_encoded(headers) {
            parse_form_body(body)?
        } else {
            Vec::new()
        };

        Ok(Some(Self {
            method: parts.method.as_str().to_owned(),
            uri,
            form_body,
            api_key: api_key.to_owned(),
            timestamp: timestamp.to_owned(),
            version: version.map(ToOwned::to_owned),
            signature: signature.to_owned(),
        }))
    }

    /// Borrow the signed fields for canonicalization, given the parsed
    /// timestamp.
    #[must_use]
    pub fn fields(&self, timestamp: i64) -> RequestFields<'_> {
        RequestFields {
            api_key: &self.api_key,
            timestamp_raw: &self.timestamp,
            timestamp,
            method: &self.method,
            uri: &self.uri,
            form_body: &self.form_body,
        }
    }
}

/// Whether the request body is `application/x-www-form-urlencoded`.
#[must_use]
pub fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

fn header_text<'a>(value: &'a HeaderValue, name: &'static str) -> Result<&'a str, AuthError> {
    value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader(name))
}
