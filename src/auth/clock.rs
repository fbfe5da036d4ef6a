//! Monotonic time source for nonce expiry.
//!
//! Production code uses [`SystemClock`]. Tests inject a [`ManualClock`] so TTL
//! behaviour can be checked without sleeping.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic instants.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward, stopping at the latest representable instant.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let mut remaining = by;
        let mut step = by;
        while !remaining.is_zero() && !step.is_zero() {
            step = step.min(remaining);
            match current.checked_add(step) {
                Some(next) => {
                    *current = next;
                    remaining -= step;
                }
                None => step /= 2,
            }
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
