//! Health check route.

use crate::error::DaemonError;

use super::traits::{Route, RouteContext};

/// `GET /health`.
///
/// Signed like everything else so unauthenticated local processes learn
/// nothing about the service.
pub struct HealthRoute;

impl Route for HealthRoute {
    fn method(&self) -> &'static str {
        "GET"
    }

    fn path(&self) -> &'static str {
        "/health"
    }

    fn handle(&self, ctx: &RouteContext<'_>) -> Result<serde_json::Value, DaemonError> {
        Ok(serde_json::json!({
            "status": "ok",
            "nonce_cache_entries": ctx.authenticator.active_nonces(),
        }))
    }
}
