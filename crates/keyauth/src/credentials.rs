//! Credential store trait and implementations.
//!
//! The verifier never owns credentials. It asks a [`CredentialStore`] two
//! questions: which principal holds this API key, and what is that
//! principal's shared secret. [`StaticCredentialStore`] answers them from
//! memory and is what the demo server and tests use.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Length of a generated API key.
pub const API_KEY_LEN: usize = 12;

/// Length of a generated shared secret.
pub const SHARED_SECRET_LEN: usize = 48;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Identifier of an authenticated principal (a user, a service account, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Create a principal identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for PrincipalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A symmetric signing secret. Its `Debug` output is redacted so it cannot
/// leak through tracing fields.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw secret for signing.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty (treated as "not configured").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

impl From<&str> for SharedSecret {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// An API key, its shared secret, and the principal owning them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque API key, unique per principal.
    pub api_key: String,
    /// Shared secret used to sign requests.
    pub shared_secret: SharedSecret,
    /// Principal that owns the key.
    pub owner_id: PrincipalId,
}

/// A freshly generated API key and shared secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Generated API key ([`API_KEY_LEN`] alphanumeric characters).
    pub api_key: String,
    /// Generated shared secret ([`SHARED_SECRET_LEN`] alphanumeric characters).
    pub shared_secret: SharedSecret,
}

impl KeyPair {
    /// Generate a new key pair from OS randomness.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyauth::credentials::KeyPair;
    ///
    /// let pair = KeyPair::generate();
    /// assert_eq!(pair.api_key.len(), 12);
    /// assert_eq!(pair.shared_secret.expose().len(), 48);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        Self {
            api_key: random_alphanumeric(API_KEY_LEN),
            shared_secret: SharedSecret::new(random_alphanumeric(SHARED_SECRET_LEN)),
        }
    }

    /// Bind the pair to a principal.
    #[must_use]
    pub fn into_credential(self, owner_id: PrincipalId) -> Credential {
        Credential {
            api_key: self.api_key,
            shared_secret: self.shared_secret,
            owner_id,
        }
    }
}

/// Trait for resolving API keys and shared secrets.
///
/// Implementations may back this with a database, a configuration file, or a
/// cache in front of either. Returning `Err` means the store could not answer;
/// the verifier then rejects the request rather than letting it through.
pub trait CredentialStore: Send + Sync {
    /// Find the principal holding `api_key`, or `None` if no one does.
    fn resolve_principal(&self, api_key: &str) -> Result<Option<PrincipalId>, StoreError>;

    /// Retrieve the shared secret configured for `principal`, if any.
    fn shared_secret(&self, principal: &PrincipalId) -> Result<Option<SharedSecret>, StoreError>;
}

/// An in-memory credential store backed by `HashMap`s.
///
/// # Examples
///
/// ```
/// use keyauth::credentials::{Credential, CredentialStore, StaticCredentialStore};
///
/// let store = StaticCredentialStore::new(vec![Credential {
///     api_key: "asdf123".to_owned(),
///     shared_secret: "fdsa4321".into(),
///     owner_id: "author".into(),
/// }]);
///
/// let principal = store.resolve_principal("asdf123").unwrap().unwrap();
/// assert_eq!(principal.as_str(), "author");
/// assert!(store.resolve_principal("NOTAREALKEY").unwrap().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    principals: HashMap<String, PrincipalId>,
    secrets: HashMap<PrincipalId, SharedSecret>,
}

impl StaticCredentialStore {
    /// Create a store from an iterable of credentials.
    pub fn new(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let mut store = Self::default();
        for credential in credentials {
            store.insert(credential);
        }
        store
    }

    /// Parse a JSON array of credentials.
    ///
    /// ```json
    /// [{"api_key": "asdf123", "shared_secret": "fdsa4321", "owner_id": "author"}]
    /// ```
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let credentials: Vec<Credential> = serde_json::from_str(json)?;
        Ok(Self::new(credentials))
    }

    /// Add or replace a credential.
    pub fn insert(&mut self, credential: Credential) {
        self.principals
            .insert(credential.api_key, credential.owner_id.clone());
        self.secrets
            .insert(credential.owner_id, credential.shared_secret);
    }

    /// Number of API keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.principals.len()
    }

    /// Whether the store holds no API keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.principals.is_empty()
    }
}

impl CredentialStore for StaticCredentialStore {
    fn resolve_principal(&self, api_key: &str) -> Result<Option<PrincipalId>, StoreError> {
        Ok(self.principals.get(api_key).cloned())
    }

    fn shared_secret(&self, principal: &PrincipalId) -> Result<Option<SharedSecret>, StoreError> {
        Ok(self.secrets.get(principal).cloned())
    }
}

/// Draw `len` uniformly distributed alphanumeric characters.
fn random_alphanumeric(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let bytes = uuid::Uuid::new_v4().into_bytes();
        // Bytes 6 and 8 carry the UUID version and variant bits.
        for (_, byte) in bytes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 6 && *i != 8)
        {
            // 248 is the largest multiple of 62 below 256.
            if *byte < 248 && out.len() < len {
                out.push(char::from(ALPHANUMERIC[usize::from(*byte % 62)]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> Credential {
        Credential {
            api_key: "asdf123".to_owned(),
            shared_secret: SharedSecret::new("fdsa4321"),
            owner_id: PrincipalId::new("author"),
        }
    }

    fn contributor() -> Credential {
        Credential {
            api_key: "asdfg12345".to_owned(),
            shared_secret: SharedSecret::new("gfdsa54321"),
            owner_id: PrincipalId::new("contributor"),
        }
    }

    #[test]
    fn test_should_resolve_principal_for_known_key() {
        let store = StaticCredentialStore::new(vec![author(), contributor()]);

        let principal = store.resolve_principal("asdf123").unwrap();
        assert_eq!(principal, Some(PrincipalId::new("author")));

        let principal = store.resolve_principal("asdfg12345").unwrap();
        assert_eq!(principal, Some(PrincipalId::new("contributor")));
    }

    #[test]
    fn test_should_return_none_for_unknown_key() {
        let store = StaticCredentialStore::new(vec![author()]);
        assert_eq!(store.resolve_principal("NOTAREALKEY").unwrap(), None);
    }

    #[test]
    fn test_should_return_secret_for_principal() {
        let store = StaticCredentialStore::new(vec![author()]);
        let secret = store
            .shared_secret(&PrincipalId::new("author"))
            .unwrap()
            .unwrap();
        assert_eq!(secret.expose(), "fdsa4321");
        assert_eq!(
            store.shared_secret(&PrincipalId::new("nobody")).unwrap(),
            None
        );
    }

    #[test]
    fn test_should_load_store_from_json() {
        let json = r#"[
            {"api_key": "asdf123", "shared_secret": "fdsa4321", "owner_id": "author"},
            {"api_key": "asdfg12345", "shared_secret": "gfdsa54321", "owner_id": "contributor"}
        ]"#;
        let store = StaticCredentialStore::from_json(json).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.resolve_principal("asdfg12345").unwrap(),
            Some(PrincipalId::new("contributor"))
        );
    }

    #[test]
    fn test_should_reject_malformed_json() {
        assert!(StaticCredentialStore::from_json("{\"api_key\": 1}").is_err());
    }

    #[test]
    fn test_should_redact_secret_in_debug_output() {
        let rendered = format!("{:?}", author());
        assert!(!rendered.contains("fdsa4321"));
        assert!(rendered.contains("SharedSecret(***)"));
    }

    #[test]
    fn test_should_generate_alphanumeric_key_pair() {
        let pair = KeyPair::generate();
        assert_eq!(pair.api_key.len(), API_KEY_LEN);
        assert_eq!(pair.shared_secret.expose().len(), SHARED_SECRET_LEN);
        assert!(pair.api_key.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(
            pair.shared_secret
                .expose()
                .bytes()
                .all(|b| b.is_ascii_alphanumeric())
        );
    }

    #[test]
    fn test_should_generate_distinct_key_pairs() {
        let first = KeyPair::generate();
        let second = KeyPair::generate();
        assert_ne!(first.api_key, second.api_key);
        assert_ne!(first.shared_secret, second.shared_secret);
    }

    #[test]
    fn test_should_bind_generated_pair_to_owner() {
        let credential = KeyPair::generate().into_credential(PrincipalId::new("author"));
        let store = StaticCredentialStore::new(vec![credential.clone()]);
        assert_eq!(
            store.resolve_principal(&credential.api_key).unwrap(),
            Some(PrincipalId::new("author"))
        );
    }
}
