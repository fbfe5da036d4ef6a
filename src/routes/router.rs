//! Router for dispatching requests to route handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::RequestAuthenticator;
use crate::error::{DaemonError, DaemonResult, RouteErrorKind};
use crate::protocol::Request;

use super::handshake::HandshakeRoute;
use super::health::HealthRoute;
use super::traits::{Route, RouteContext};

/// Table of all served routes, keyed by path.
#[derive(Clone)]
pub struct Router {
    routes: HashMap<&'static str, Vec<Arc<dyn Route>>>,
    authenticator: Arc<RequestAuthenticator>,
}

impl Router {
    /// Create a router with all built-in routes.
    pub fn new(authenticator: Arc<RequestAuthenticator>) -> Self {
        let mut router = Self {
            routes: HashMap::new(),
            authenticator,
        };

        router.register(Arc::new(HandshakeRoute));
        router.register(Arc::new(HealthRoute));

        info!(count = router.len(), "Router initialized");

        router
    }

    /// Register a route.
    pub fn register(&mut self, route: Arc<dyn Route>) {
        debug!(method = route.method(), path = route.path(), "Registering route");
        self.routes.entry(route.path()).or_default().push(route);
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route a request and run its handler.
    ///
    /// Unknown paths are rejected before authentication. For signed routes the
    /// request must authenticate before the handler runs.
    pub fn dispatch(&self, request_id: Uuid, request: &Request) -> DaemonResult<serde_json::Value> {
        let candidates = self.routes.get(request.path.as_str()).ok_or_else(|| {
            DaemonError::Route {
                kind: RouteErrorKind::NotFound {
                    path: request.path.clone(),
                },
            }
        })?;

        let route = candidates
            .iter()
            .find(|route| route.method().eq_ignore_ascii_case(&request.method))
            .ok_or_else(|| DaemonError::Route {
                kind: RouteErrorKind::MethodNotAllowed {
                    method: request.method.clone(),
                    path: request.path.clone(),
                },
            })?;

        if route.requires_signature() {
            self.authenticator.authenticate(
                request.nonce()?,
                request.signature()?,
                &request.path,
                request.body_bytes(),
            )?;
        }

        let ctx = RouteContext {
            request_id,
            request,
            authenticator: &self.authenticator,
        };

        route.handle(&ctx)
    }
}
