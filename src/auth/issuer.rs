//! Nonce issuance for the signing handshake.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;

use crate::error::AuthErrorKind;

/// Random bytes per nonce; hex rendering doubles the length.
pub const NONCE_BYTES: usize = 32;

/// A freshly issued nonce with advisory expiry metadata.
///
/// `expires_at` is informational for the client. Whether the nonce can still
/// be used is decided by the nonce store at admission time.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedNonce {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// Generates single-use nonces from the OS CSPRNG.
pub struct NonceIssuer {
    rng: SystemRandom,
    ttl_seconds: u64,
}

impl NonceIssuer {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            rng: SystemRandom::new(),
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a new nonce.
    pub fn issue(&self) -> Result<IssuedNonce, AuthErrorKind> {
        let mut bytes = [0u8; NONCE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthErrorKind::RandomSourceUnavailable)?;

        let issued_at = Utc::now();
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = ChronoDuration::try_seconds(ttl)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Ok(IssuedNonce {
            nonce: hex::encode(bytes),
            issued_at,
            expires_at,
            ttl_seconds: self.ttl_seconds,
        })
    }
}
