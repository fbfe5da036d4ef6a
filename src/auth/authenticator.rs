//! Request authentication: handshake issuance and signed-request checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::{AuthErrorKind, DaemonError};

use super::hmac::{verify_signature, SignatureContext};
use super::issuer::NonceIssuer;
use super::nonce::NonceStore;
use super::secret::SecretProvider;

/// Handshake payload returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Handshake {
    /// Hex-encoded 32-byte nonce for signing the next request.
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    /// Advisory; the client should handshake again after this.
    pub expires_at: DateTime<Utc>,
    pub nonce_ttl_seconds: u64,
    /// Names where the signing secret lives, never the secret itself.
    pub key_id: String,
}

/// Validates signed requests against single-use nonces.
pub struct RequestAuthenticator {
    secrets: Arc<dyn SecretProvider>,
    nonce_store: Arc<dyn NonceStore>,
    issuer: NonceIssuer,
}

impl RequestAuthenticator {
    /// Create a new authenticator.
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        nonce_store: Arc<dyn NonceStore>,
        nonce_ttl_seconds: u64,
    ) -> Self {
        Self {
            secrets,
            nonce_store,
            issuer: NonceIssuer::new(nonce_ttl_seconds),
        }
    }

    pub fn nonce_ttl_seconds(&self) -> u64 {
        self.issuer.ttl_seconds()
    }

    pub fn key_id(&self) -> &str {
        self.secrets.key_id()
    }

    /// Resolve the signing secret once, discarding it.
    pub fn check_secret(&self) -> Result<(), DaemonError> {
        self.secrets.resolve()?;
        Ok(())
    }

    /// Issue a nonce for the client's next signed request.
    ///
    /// Refuses to issue anything while the signing secret cannot be resolved,
    /// since no request signed against it could ever verify.
    pub fn handshake(&self) -> Result<Handshake, DaemonError> {
        self.secrets.resolve()?;

        let issued = self.issuer.issue()?;
        Ok(Handshake {
            nonce: issued.nonce,
            issued_at: issued.issued_at,
            expires_at: issued.expires_at,
            nonce_ttl_seconds: issued.ttl_seconds,
            key_id: self.secrets.key_id().to_string(),
        })
    }

    /// Authenticate a request.
    ///
    /// Checks, in order:
    /// 1. Nonce and signature are present
    /// 2. Signature is valid for (nonce, path, body)
    /// 3. Nonce has not been used within the TTL window
    ///
    /// The nonce is only consumed once the signature verifies, so a forged
    /// request cannot burn a legitimate client's nonce.
    pub fn authenticate(
        &self,
        nonce: &str,
        signature: &str,
        path: &str,
        body: &[u8],
    ) -> Result<(), DaemonError> {
        if nonce.is_empty() {
            return Err(AuthErrorKind::MissingNonce.into());
        }
        if signature.is_empty() {
            return Err(AuthErrorKind::MissingSignature.into());
        }

        let secret = self.secrets.resolve()?;
        let context = SignatureContext::new(nonce, path, body);
        if !verify_signature(&secret, &context, signature) {
            return Err(AuthErrorKind::InvalidSignature.into());
        }

        self.nonce_store
            .admit(nonce, self.nonce_ttl_seconds())
            .map_err(|_| AuthErrorKind::ReplayedNonce)?;

        let nonce_prefix: String = nonce.chars().take(8).collect();
        debug!(nonce_prefix = %nonce_prefix, path = %path, "Request authenticated");
        Ok(())
    }

    /// Nonces currently on record, for health reporting.
    pub fn active_nonces(&self) -> usize {
        self.nonce_store.active_count(self.nonce_ttl_seconds())
    }
}
