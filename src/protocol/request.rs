//! Request envelope for the gate protocol.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult, ProtocolErrorKind};

/// Header carrying the handshake nonce.
pub const NONCE_HEADER: &str = "X-Nonce";

/// Header carrying the hex HMAC signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// A request from a client.
///
/// Mirrors the shape of an HTTP request: the signature covers `path` and the
/// raw bytes of `body` exactly as sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request method (e.g., "GET", "POST").
    pub method: String,

    /// Request path (e.g., "/health").
    pub path: String,

    /// Request headers. Names are matched case-insensitively.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request body.
    #[serde(default)]
    pub body: String,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Set a header (builder pattern).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body (builder pattern).
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value, ignoring ASCII case in the name.
    ///
    /// Several spellings of the same name are accepted only when they carry
    /// the same value; otherwise the request is ambiguous and rejected.
    pub fn header(&self, name: &str) -> DaemonResult<Option<&str>> {
        let mut found: Option<&str> = None;
        for (key, value) in &self.headers {
            if !key.eq_ignore_ascii_case(name) {
                continue;
            }
            match found {
                Some(existing) if existing != value.as_str() => {
                    return Err(DaemonError::Protocol {
                        kind: ProtocolErrorKind::InvalidMessageFormat {
                            message: format!("Conflicting values for header {}", name),
                        },
                    });
                }
                _ => found = Some(value.as_str()),
            }
        }
        Ok(found)
    }

    /// The `X-Nonce` header, or empty when absent.
    pub fn nonce(&self) -> DaemonResult<&str> {
        Ok(self.header(NONCE_HEADER)?.unwrap_or_default())
    }

    /// The `X-Signature` header, or empty when absent.
    pub fn signature(&self) -> DaemonResult<&str> {
        Ok(self.header(SIGNATURE_HEADER)?.unwrap_or_default())
    }

    /// Raw body bytes as covered by the signature.
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }
}
