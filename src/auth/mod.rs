//! Authentication module.
//!
//! Handles signing secret resolution, nonce issuance, HMAC signing, and
//! single-use nonce tracking.

mod authenticator;
mod clock;
mod hmac;
mod issuer;
mod nonce;
mod secret;

pub use authenticator::{Handshake, RequestAuthenticator};
pub use clock::{Clock, ManualClock, SystemClock};
pub use hmac::{compute_signature, verify_signature, SignatureContext};
pub use issuer::{IssuedNonce, NonceIssuer, NONCE_BYTES};
pub use nonce::{InMemoryNonceStore, NonceAlreadyUsed, NonceStore};
pub use secret::{
    EnvSecretProvider, FileSecretProvider, SecretProvider, SigningSecret, StaticSecretProvider,
    MIN_SECRET_LEN,
};
