//! API key and shared-secret request authentication.
//!
//! A client holds an API key and a shared secret. It signs every HTTP request
//! over a canonical representation of that request and sends four headers:
//!
//! | Header | Meaning | Required |
//! |--------|---------|----------|
//! | `X-API-Key` | API key identifying the principal | yes |
//! | `X-API-Timestamp` | Unix seconds at signing time | yes |
//! | `X-API-Signature` | Lowercase hex signature | yes |
//! | `X-API-Version` | Schema version (absent means v0) | no |
//!
//! The server recomputes the signature with the secret it looks up for the
//! key, compares it in constant time, and checks that the timestamp is within
//! the replay window.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keyauth::{
//!     AuthOutcome, Credential, KeyAuthVerifier, RequestSigner, SchemaVersion,
//!     StaticCredentialStore, VerifierPolicy,
//! };
//!
//! // Server side: a credential store and a verifier.
//! let store = StaticCredentialStore::new(vec![Credential {
//!     api_key: "asdf123".to_owned(),
//!     shared_secret: "fdsa4321".into(),
//!     owner_id: "author".into(),
//! }]);
//! let verifier = KeyAuthVerifier::new(VerifierPolicy::default(), Arc::new(store));
//!
//! // Client side: sign the request.
//! let signer = RequestSigner::new("asdf123", "fdsa4321".into(), SchemaVersion::V1);
//! let mut request = http::Request::builder()
//!     .method("GET")
//!     .uri("/wp-json/wp/v2/users/me")
//!     .body(())
//!     .unwrap();
//! signer
//!     .sign_now("GET", "/wp-json/wp/v2/users/me", &[])
//!     .apply(request.headers_mut())
//!     .unwrap();
//!
//! let (parts, ()) = request.into_parts();
//! assert_eq!(
//!     verifier.authenticate(None, &parts, b""),
//!     AuthOutcome::Authenticated("author".into())
//! );
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - Canonical message construction and body normalization
//! - [`client`] - Outbound request signing
//! - [`config`] - Environment-driven configuration
//! - [`credentials`] - Credential store trait, in-memory store, key generation
//! - [`error`] - Authentication error types
//! - [`pipeline`] - Composable authentication pipeline
//! - [`replay`] - Replay-window enforcement
//! - [`request`] - Header names and signed-field extraction
//! - [`signature`] - Signature computation and constant-time comparison
//! - [`verify`] - The verification flow
//! - [`version`] - Schema version negotiation

pub mod canonical;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod replay;
pub mod request;
pub mod signature;
pub mod verify;
pub mod version;

pub use canonical::BodyUnescape;
pub use client::{RequestSigner, SignatureHeaders};
pub use config::KeyAuthConfig;
pub use credentials::{
    Credential, CredentialStore, KeyPair, PrincipalId, SharedSecret, StaticCredentialStore,
};
pub use error::{AuthError, StoreError};
pub use pipeline::{AuthPipeline, Authenticator};
pub use replay::ReplayWindow;
pub use request::SignedRequest;
pub use verify::{AuthOutcome, KeyAuthVerifier, VerifierPolicy};
pub use version::SchemaVersion;
