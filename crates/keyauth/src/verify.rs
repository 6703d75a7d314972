//! Signed-request verification.
//!
//! This module implements the verification flow:
//!
//! 1. Pass a previously established identity through unchanged.
//! 2. Extract the `X-API-Key`, `X-API-Timestamp` and `X-API-Signature`
//!    headers; if any is absent the verifier has no opinion.
//! 3. Negotiate the schema version from `X-API-Version` (absent means v0).
//! 4. Resolve the API key to a principal and its shared secret.
//! 5. Rebuild the canonical message and compute the expected signature.
//! 6. Compare signatures in constant time and check the replay window.
//!
//! Any failure in steps 3–6 yields [`AuthOutcome::Rejected`]. The specific
//! [`AuthError`] is logged at `debug` level and never returned to the caller.
//!
//! The main entry point is [`KeyAuthVerifier::authenticate`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::canonical::{BodyUnescape, build_canonical_message};
use crate::credentials::{CredentialStore, PrincipalId, SharedSecret};
use crate::error::AuthError;
use crate::replay::{ReplayWindow, now_unix, parse_timestamp};
use crate::request::SignedRequest;
use crate::signature::{compute_signature, signatures_match};
use crate::version::SchemaVersion;

/// The result of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The request is authenticated as this principal.
    Authenticated(PrincipalId),
    /// The request does not use this scheme; other mechanisms may decide.
    NoOpinion,
    /// The request used this scheme and failed. Terminal.
    Rejected,
}

impl AuthOutcome {
    /// The authenticated principal, if any.
    #[must_use]
    pub fn principal(&self) -> Option<&PrincipalId> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            Self::NoOpinion | Self::Rejected => None,
        }
    }

    /// Whether the attempt was rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// Verification policy: what the verifier advertises and how strict it is.
///
/// # Examples
///
/// ```
/// use keyauth::replay::ReplayWindow;
/// use keyauth::verify::VerifierPolicy;
/// use keyauth::version::SchemaVersion;
///
/// let policy = VerifierPolicy::builder()
///     .replay_window(ReplayWindow::new(60))
///     .supported_versions(vec![SchemaVersion::V1])
///     .build();
/// assert!(!policy.supports(SchemaVersion::V0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct VerifierPolicy {
    /// Maximum distance between the request timestamp and now.
    #[builder(default)]
    pub replay_window: ReplayWindow,
    /// Schema versions this verifier accepts.
    #[builder(default = SchemaVersion::ALL.to_vec())]
    pub supported_versions: Vec<SchemaVersion>,
    /// Escaping to undo on form values before normalization.
    #[builder(default)]
    pub body_unescape: BodyUnescape,
}

impl Default for VerifierPolicy {
    fn default() -> Self {
        Self {
            replay_window: ReplayWindow::default(),
            supported_versions: SchemaVersion::ALL.to_vec(),
            body_unescape: BodyUnescape::None,
        }
    }
}

impl VerifierPolicy {
    /// Whether `version` is advertised by this policy.
    #[must_use]
    pub fn supports(&self, version: SchemaVersion) -> bool {
        self.supported_versions.contains(&version)
    }

    /// Select the schema version for an optional `X-API-Version` value.
    pub fn negotiate(&self, header: Option<&str>) -> Result<SchemaVersion, AuthError> {
        let version = SchemaVersion::from_header(header)?;
        if self.supports(version) {
            Ok(version)
        } else {
            Err(AuthError::UnsupportedVersion(version.to_string()))
        }
    }
}

/// Verifies requests signed with an API key and shared secret.
///
/// The verifier holds no per-request state; it can be shared across threads
/// and used for any number of concurrent requests.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use keyauth::client::RequestSigner;
/// use keyauth::credentials::{Credential, StaticCredentialStore};
/// use keyauth::verify::{AuthOutcome, KeyAuthVerifier, VerifierPolicy};
/// use keyauth::version::SchemaVersion;
///
/// let store = StaticCredentialStore::new(vec![Credential {
///     api_key: "asdf123".to_owned(),
///     shared_secret: "fdsa4321".into(),
///     owner_id: "author".into(),
/// }]);
/// let verifier = KeyAuthVerifier::new(VerifierPolicy::default(), Arc::new(store));
///
/// let signer = RequestSigner::new("asdf123", "fdsa4321".into(), SchemaVersion::V1);
/// let now = 1_700_000_000;
/// let signed = signer.sign("GET", "/wp-json/wp/v2/users/me", &[], now);
///
/// let mut request = http::Request::builder().uri("/wp-json/wp/v2/users/me");
/// for (name, value) in signed.pairs() {
///     request = request.header(name, value);
/// }
/// let (parts, ()) = request.body(()).unwrap().into_parts();
///
/// let outcome = verifier.authenticate_at(None, &parts, b"", now);
/// assert_eq!(outcome, AuthOutcome::Authenticated("author".into()));
/// ```
#[derive(Clone)]
pub struct KeyAuthVerifier {
    policy: VerifierPolicy,
    store: Arc<dyn CredentialStore>,
}

impl fmt::Debug for KeyAuthVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAuthVerifier")
            .field("policy", &self.policy)
            .field("store", &"...")
            .finish()
    }
}

impl KeyAuthVerifier {
    /// Create a verifier from a policy and a credential store.
    #[must_use]
    pub fn new(policy: VerifierPolicy, store: Arc<dyn CredentialStore>) -> Self {
        Self { policy, store }
    }

    /// The policy this verifier enforces.
    #[must_use]
    pub fn policy(&self) -> &VerifierPolicy {
        &self.policy
    }

    /// Authenticate a request against the current system time.
    ///
    /// `prior` is an identity established earlier in the pipeline; when it is
    /// set the request is not inspected at all.
    #[must_use]
    pub fn authenticate(
        &self,
        prior: Option<PrincipalId>,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> AuthOutcome {
        self.authenticate_at(prior, parts, body, now_unix())
    }

    /// Authenticate a request as of `now` (Unix seconds).
    #[must_use]
    pub fn authenticate_at(
        &self,
        prior: Option<PrincipalId>,
        parts: &http::request::Parts,
        body: &[u8],
        now: i64,
    ) -> AuthOutcome {
        if let Some(principal) = prior {
            return AuthOutcome::Authenticated(principal);
        }

        let request = match SignedRequest::from_parts(parts, body) {
            Ok(Some(request)) => request,
            Ok(None) => return AuthOutcome::NoOpinion,
            Err(err) => {
                debug!(error = %err, "rejecting request with malformed auth headers");
                return AuthOutcome::Rejected;
            }
        };

        match self.verify(&request, now) {
            Ok(principal) => {
                debug!(api_key = %request.api_key, principal = %principal, "key auth succeeded");
                AuthOutcome::Authenticated(principal)
            }
            Err(err) => {
                debug!(api_key = %request.api_key, error = %err, "key auth rejected");
                AuthOutcome::Rejected
            }
        }
    }

    /// Verify an extracted request, reporting the specific failure.
    ///
    /// The expected signature is computed on every path. When the version,
    /// timestamp or key lookup fails, hashing still runs with a fallback
    /// version, timestamp and an empty secret, and the recorded error is
    /// returned afterwards. Response time therefore does not reveal whether
    /// an API key exists.
    pub fn verify(&self, request: &SignedRequest, now: i64) -> Result<PrincipalId, AuthError> {
        let version = self.policy.negotiate(request.version.as_deref());
        let timestamp = parse_timestamp(&request.timestamp);
        let credential = self.lookup(&request.api_key);

        let empty = SharedSecret::new("");
        let secret = credential.as_ref().map_or(&empty, |(_, secret)| secret);
        let signing_version = version.as_ref().copied().unwrap_or(SchemaVersion::V1);
        let signing_timestamp = timestamp.as_ref().copied().unwrap_or_default();

        let canonical = build_canonical_message(
            &request.fields(signing_timestamp),
            signing_version,
            self.policy.body_unescape,
        );
        let expected = compute_signature(&canonical, secret, signing_version);
        let signature_ok = signatures_match(&request.signature, &expected);

        version?;
        let timestamp = timestamp?;
        let (principal, _) = credential?;

        // Evaluate both checks before branching on either.
        let window = self.policy.replay_window.check(timestamp, now);
        if !signature_ok {
            return Err(AuthError::SignatureMismatch);
        }
        window?;

        Ok(principal)
    }

    /// Resolve an API key to its principal and a non-empty shared secret.
    fn lookup(&self, api_key: &str) -> Result<(PrincipalId, SharedSecret), AuthError> {
        let principal = self
            .store
            .resolve_principal(api_key)?
            .ok_or_else(|| AuthError::UnknownKey(api_key.to_owned()))?;
        let secret = self
            .store
            .shared_secret(&principal)?
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AuthError::MissingSecret(principal.to_string()))?;
        Ok((principal, secret))
    }
}
