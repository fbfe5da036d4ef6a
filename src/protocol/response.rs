//! Response types for the gate protocol.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::DaemonError;

/// Client-facing message for an error code.
///
/// Detailed error text stays server-side. Signature failures in particular
/// get one generic message so clients cannot tell a wrong secret from a
/// tampered body.
fn sanitize_error_message(code: &str) -> &'static str {
    match code {
        "MISSING_NONCE" => "Missing X-Nonce header.",
        "MISSING_SIGNATURE" => "Missing X-Signature header.",
        "INVALID_SIGNATURE" => "Invalid request signature.",
        "REPLAYED_NONCE" => "Nonce already used. Reauthenticate to obtain a new session nonce.",
        "CONFIGURATION_ERROR" => "HMAC signing secret not configured.",
        "NOT_FOUND" => "Not found.",
        "METHOD_NOT_ALLOWED" => "Method not allowed.",
        "INVALID_REQUEST" => "Invalid request.",
        "INTERNAL_ERROR" => "Internal server error.",
        _ => "An error occurred.",
    }
}

/// A response from the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub success: bool,

    /// HTTP-style status code.
    pub status: u16,

    /// Unique identifier for this request/response pair.
    pub request_id: Uuid,

    /// Response data on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error details on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Error details in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g., "INVALID_SIGNATURE", "REPLAYED_NONCE").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

impl Response {
    /// Create a success response with a specific request ID.
    pub fn success_with_id(request_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            success: true,
            status: 200,
            request_id,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response for `err`.
    ///
    /// The message sent to the client is sanitized per error code. The full
    /// error is logged server-side for debugging.
    pub fn from_error(request_id: Uuid, err: &DaemonError) -> Self {
        let code = err.code();

        debug!(
            request_id = %request_id,
            code = code,
            error = %err,
            "Error response (sanitized for client)"
        );

        Self {
            success: false,
            status: err.status(),
            request_id,
            data: None,
            error: Some(ErrorResponse {
                code: code.to_string(),
                message: sanitize_error_message(code).to_string(),
            }),
        }
    }

    /// The error code, if this is an error response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
