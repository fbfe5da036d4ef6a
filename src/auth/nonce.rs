//! In-memory nonce store for replay attack prevention.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use super::clock::{Clock, SystemClock};

/// The nonce was already admitted within its TTL window.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Nonce already used")]
pub struct NonceAlreadyUsed;

/// Single-use admission of nonces.
///
/// Implementations must make `admit` atomic per nonce value: two concurrent
/// calls for the same nonce must never both succeed.
pub trait NonceStore: Send + Sync {
    /// Purge records older than `ttl_seconds`, then record `nonce` as used.
    ///
    /// Fails if `nonce` is still on record.
    fn admit(&self, nonce: &str, ttl_seconds: u64) -> Result<(), NonceAlreadyUsed>;

    /// Purge records older than `ttl_seconds` and count the rest.
    ///
    /// Diagnostic only; never consult this for authorization.
    fn active_count(&self, ttl_seconds: u64) -> usize;
}

/// Thread-safe in-memory nonce store with TTL-based expiry.
///
/// Expired records are dropped lazily on every call, so memory stays bounded
/// by the nonces seen in the last TTL window without a background sweep.
pub struct InMemoryNonceStore {
    /// Map of nonce -> first-seen time.
    nonces: Mutex<HashMap<String, Instant>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryNonceStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn purge_expired(nonces: &mut HashMap<String, Instant>, now: Instant, ttl_seconds: u64) {
        let ttl = Duration::from_secs(ttl_seconds);
        nonces.retain(|_, first_seen| now.saturating_duration_since(*first_seen) <= ttl);
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn admit(&self, nonce: &str, ttl_seconds: u64) -> Result<(), NonceAlreadyUsed> {
        // Recover from mutex poisoning; the map holds no partial state.
        let mut nonces = self.nonces.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        Self::purge_expired(&mut nonces, now, ttl_seconds);

        if nonces.contains_key(nonce) {
            return Err(NonceAlreadyUsed);
        }

        nonces.insert(nonce.to_string(), now);
        Ok(())
    }

    fn active_count(&self, ttl_seconds: u64) -> usize {
        let mut nonces = self.nonces.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();
        Self::purge_expired(&mut nonces, now, ttl_seconds);
        nonces.len()
    }
}
