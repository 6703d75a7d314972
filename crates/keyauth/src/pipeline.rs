//! Composable authentication pipeline.
//!
//! An [`AuthPipeline`] runs a list of [`Authenticator`]s in order. Each one
//! receives the outcome so far and returns a new outcome:
//!
//! - [`AuthOutcome::NoOpinion`] lets the next authenticator decide.
//! - [`AuthOutcome::Authenticated`] is passed through by well-behaved
//!   authenticators, so an earlier identity is never overridden.
//! - [`AuthOutcome::Rejected`] stops the pipeline immediately.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::verify::{AuthOutcome, KeyAuthVerifier};

/// One authentication mechanism in a pipeline.
pub trait Authenticator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Produce the next outcome given the outcome so far.
    fn authenticate(
        &self,
        current: AuthOutcome,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> AuthOutcome;
}

impl Authenticator for KeyAuthVerifier {
    fn name(&self) -> &'static str {
        "key-auth"
    }

    fn authenticate(
        &self,
        current: AuthOutcome,
        parts: &http::request::Parts,
        body: &[u8],
    ) -> AuthOutcome {
        match current {
            AuthOutcome::Authenticated(principal) => {
                KeyAuthVerifier::authenticate(self, Some(principal), parts, body)
            }
            AuthOutcome::NoOpinion => KeyAuthVerifier::authenticate(self, None, parts, body),
            AuthOutcome::Rejected => AuthOutcome::Rejected,
        }
    }
}

/// An ordered list of authenticators.
#[derive(Clone, Default)]
pub struct AuthPipeline {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.authenticators.iter().map(|a| a.name()))
            .finish()
    }
}

impl AuthPipeline {
    /// Create an empty pipeline. An empty pipeline has no opinion on anything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an authenticator.
    #[must_use]
    pub fn with(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticators.push(authenticator);
        self
    }

    /// Number of authenticators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.authenticators.len()
    }

    /// Whether the pipeline has no authenticators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.authenticators.is_empty()
    }

    /// Run every authenticator in order, stopping at the first rejection.
    #[must_use]
    pub fn run(&self, parts: &http::request::Parts, body: &[u8]) -> AuthOutcome {
        let mut outcome = AuthOutcome::NoOpinion;
        for authenticator in &self.authenticators {
            outcome = authenticator.authenticate(outcome, parts, body);
            if outcome.is_rejected() {
                debug!(authenticator = authenticator.name(), "authentication rejected");
                break;
            }
        }
        outcome
    }
}
