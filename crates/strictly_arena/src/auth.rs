//! Connection authentication.

use async_trait::async_trait;
use derive_more::{Display, Error};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::session::{COMPUTER_LABEL, DRAW_LABEL, Identity};

/// Authentication error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Auth error: {} at {}:{}", message, file, line)]
pub struct AuthError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl AuthError {
    /// Creates a new authentication error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Verifies the credentials presented when a connection opens.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Confirms that `token` authenticates `claimed_identity`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token is unknown or belongs to someone else.
    async fn verify(&self, token: &str, claimed_identity: &str) -> Result<Identity, AuthError>;
}

/// Identities that would collide with stored result labels.
fn is_reserved(identity: &str) -> bool {
    identity.eq_ignore_ascii_case(COMPUTER_LABEL) || identity.eq_ignore_ascii_case(DRAW_LABEL)
}

/// Verifier backed by a fixed table of bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenTableVerifier {
    tokens: HashMap<String, Identity>,
}

impl TokenTableVerifier {
    /// Creates a verifier from `(token, identity)` pairs.
    #[instrument(skip(entries))]
    pub fn new(entries: impl IntoIterator<Item = (String, Identity)>) -> Self {
        let tokens: HashMap<_, _> = entries.into_iter().collect();
        info!(count = tokens.len(), "Token table loaded");
        Self { tokens }
    }
}

#[async_trait]
impl AuthVerifier for TokenTableVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str, claimed_identity: &str) -> Result<Identity, AuthError> {
        if claimed_identity.is_empty() || is_reserved(claimed_identity) {
            warn!("Rejected reserved or empty identity");
            return Err(AuthError::new(format!(
                "Identity '{}' is not allowed",
                claimed_identity
            )));
        }

        match self.tokens.get(token) {
            Some(identity) if identity == claimed_identity => {
                debug!("Token verified");
                Ok(identity.clone())
            }
            Some(_) => {
                warn!("Token presented for a different identity");
                Err(AuthError::new("Token does not belong to this identity"))
            }
            None => {
                warn!("Unknown token");
                Err(AuthError::new("Unknown token"))
            }
        }
    }
}
