//! Route trait definition.

use uuid::Uuid;

use crate::auth::RequestAuthenticator;
use crate::error::DaemonError;
use crate::protocol::Request;

/// What a route handler gets to work with.
pub struct RouteContext<'a> {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// The request as received.
    pub request: &'a Request,
    /// Shared authenticator, for routes that issue nonces or report on them.
    pub authenticator: &'a RequestAuthenticator,
}

/// Core trait for all routes the gate serves.
///
/// # Example
///
/// ```ignore
/// pub struct PingRoute;
///
/// impl Route for PingRoute {
///     fn method(&self) -> &'static str {
///         "GET"
///     }
///
///     fn path(&self) -> &'static str {
///         "/ping"
///     }
///
///     fn handle(&self, _ctx: &RouteContext<'_>) -> Result<serde_json::Value, DaemonError> {
///         Ok(serde_json::json!({"pong": true}))
///     }
/// }
/// ```
pub trait Route: Send + Sync {
    /// Request method this route answers (e.g., "GET").
    fn method(&self) -> &'static str;

    /// Exact request path this route answers (e.g., "/health").
    fn path(&self) -> &'static str;

    /// Whether requests must carry a valid nonce and signature.
    ///
    /// Only the handshake itself is exempt.
    fn requires_signature(&self) -> bool {
        true
    }

    /// Produce the response payload.
    ///
    /// Called only after authentication succeeded for signed routes.
    fn handle(&self, ctx: &RouteContext<'_>) -> Result<serde_json::Value, DaemonError>;
}
