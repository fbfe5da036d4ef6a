//! Handshake route: issues the nonce for the next signed request.

use crate::error::DaemonError;

use super::traits::{Route, RouteContext};

/// `POST /auth/handshake`.
///
/// Unsigned, since the client has no nonce yet. Fails with a configuration
/// error, issuing nothing, while the signing secret is unavailable.
pub struct HandshakeRoute;

impl Route for HandshakeRoute {
    fn method(&self) -> &'static str {
        "POST"
    }

    fn path(&self) -> &'static str {
        "/auth/handshake"
    }

    fn requires_signature(&self) -> bool {
        false
    }

    fn handle(&self, ctx: &RouteContext<'_>) -> Result<serde_json::Value, DaemonError> {
        let handshake = ctx.authenticator.handshake()?;
        Ok(serde_json::to_value(handshake)?)
    }
}
