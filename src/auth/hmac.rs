//! HMAC-SHA256 request signing and verification.
//!
//! ## Signing input
//!
//! ```text
//! HMAC-SHA256(secret, nonce || path || body)
//! ```
//!
//! The three fields are fed in this order with no separators or length
//! prefixes, and the digest is rendered as lowercase hex. Clients must
//! reproduce the exact same input.
//!
//! Note: without separators the input is only unambiguous while the nonce is
//! fixed-length hex and paths come from the router. Widening either format
//! needs length prefixes on both sides.

use ring::hmac;
use subtle::ConstantTimeEq;

use super::secret::SigningSecret;

/// The fields a request signature covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureContext<'a> {
    pub nonce: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
}

impl<'a> SignatureContext<'a> {
    pub fn new(nonce: &'a str, path: &'a str, body: &'a [u8]) -> Self {
        Self { nonce, path, body }
    }
}

/// Compute the lowercase hex signature for `context`.
pub fn compute_signature(secret: &SigningSecret, context: &SignatureContext<'_>) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.expose());
    let mut signer = hmac::Context::with_key(&key);
    signer.update(context.nonce.as_bytes());
    signer.update(context.path.as_bytes());
    signer.update(context.body);
    hex::encode(signer.sign().as_ref())
}

/// Check `candidate` against the signature for `context`.
///
/// The comparison runs in constant time over the hex text, so an uppercase or
/// otherwise re-encoded digest does not verify.
pub fn verify_signature(
    secret: &SigningSecret,
    context: &SignatureContext<'_>,
    candidate: &str,
) -> bool {
    let expected = compute_signature(secret, context);
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
