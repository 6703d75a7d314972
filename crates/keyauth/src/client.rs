//! Client-side request signing.
//!
//! [`RequestSigner`] produces the headers an outbound request needs so that a
//! [`KeyAuthVerifier`](crate::verify::KeyAuthVerifier) accepts it. It uses the
//! same canonicalizer as the verifier.

use http::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

use crate::canonical::{BodyUnescape, RequestFields, build_canonical_message};
use crate::credentials::SharedSecret;
use crate::replay::now_unix;
use crate::request::{API_KEY_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, VERSION_HEADER};
use crate::signature::compute_signature;
use crate::version::SchemaVersion;

/// Signs outbound requests with an API key and shared secret.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    api_key: String,
    secret: SharedSecret,
    version: SchemaVersion,
}

/// The authentication headers for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    /// Value for `X-API-Key`.
    pub api_key: String,
    /// Value for `X-API-Timestamp`.
    pub timestamp: String,
    /// Value for `X-API-Version`; `None` means the header is omitted.
    pub version: Option<&'static str>,
    /// Value for `X-API-Signature`.
    pub signature: String,
}

impl RequestSigner {
    /// Create a signer using `version` for every request.
    ///
    /// The API key must be a valid header value; debug builds panic otherwise.
    pub fn new(api_key: impl Into<String>, secret: SharedSecret, version: SchemaVersion) -> Self {
        let api_key = api_key.into();
        debug_assert!(
            HeaderValue::from_str(&api_key).is_ok(),
            "API key is not a valid header value: {api_key:?}"
        );
        Self {
            api_key,
            secret,
            version,
        }
    }

    /// The schema version this signer uses.
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Sign a request as of `timestamp` (Unix seconds).
    ///
    /// `uri` is the path and query exactly as it will be sent. `form_body`
    /// holds the decoded pairs of an `application/x-www-form-urlencoded` body
    /// and must be empty for any other body.
    #[must_use]
    pub fn sign(
        &self,
        method: &str,
        uri: &str,
        form_body: &[(String, String)],
        timestamp: i64,
    ) -> SignatureHeaders {
        let timestamp_raw = timestamp.to_string();
        let fields = RequestFields {
            api_key: &self.api_key,
            timestamp_raw: &timestamp_raw,
            timestamp,
            method,
            uri,
            form_body,
        };
        let canonical = build_canonical_message(&fields, self.version, BodyUnescape::None);
        let signature = compute_signature(&canonical, &self.secret, self.version);

        SignatureHeaders {
            api_key: self.api_key.clone(),
            timestamp: timestamp_raw,
            version: self.version.header_value(),
            signature,
        }
    }

    /// Sign a request as of the current system time.
    #[must_use]
    pub fn sign_now(&self, method: &str, uri: &str, form_body: &[(String, String)]) -> SignatureHeaders {
        self.sign(method, uri, form_body, now_unix())
    }
}

impl SignatureHeaders {
    /// Header name/value pairs to attach to the request.
    pub fn pairs(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (API_KEY_HEADER, Some(self.api_key.as_str())),
            (TIMESTAMP_HEADER, Some(self.timestamp.as_str())),
            (VERSION_HEADER, self.version),
            (SIGNATURE_HEADER, Some(self.signature.as_str())),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    /// Insert the headers into `headers`, replacing existing values.
    ///
    /// Fails only if the API key contains bytes that are not allowed in a
    /// header value.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
        for (name, value) in self.pairs() {
            headers.insert(HeaderName::from_static(name), HeaderValue::from_str(value)?);
        }
        Ok(())
    }
}
