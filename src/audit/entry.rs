//! Audit entry types.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One line of the audit log.
///
/// Records who asked for what and whether the gate let it through. Nonces,
/// signatures and bodies are never recorded.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// RFC 3339 timestamp when the request finished.
    pub timestamp: String,
    /// Unique identifier for the request.
    pub request_id: Uuid,
    /// Request method as sent by the client.
    pub method: String,
    /// Request path as sent by the client.
    pub path: String,
    /// Outcome of the request.
    pub result: AuditResult,
    /// Handling time in milliseconds.
    pub duration_ms: u64,
}

impl AuditEntry {
    /// Entry for a request that was served.
    pub fn accepted(request_id: Uuid, method: &str, path: &str, duration_ms: u64) -> Self {
        Self::with_result(request_id, method, path, AuditResult::Accepted, duration_ms)
    }

    /// Entry for a request that was refused.
    pub fn rejected(
        request_id: Uuid,
        method: &str,
        path: &str,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self::with_result(
            request_id,
            method,
            path,
            AuditResult::Rejected {
                error_code: error_code.into(),
                error_message: error_message.into(),
            },
            duration_ms,
        )
    }

    fn with_result(
        request_id: Uuid,
        method: &str,
        path: &str,
        result: AuditResult,
        duration_ms: u64,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            request_id,
            method: method.to_string(),
            path: path.to_string(),
            result,
            duration_ms,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.result, AuditResult::Accepted)
    }
}

/// Outcome of a request for audit purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AuditResult {
    Accepted,
    Rejected {
        /// Stable error code, as sent to the client.
        error_code: String,
        /// Server-side error detail.
        error_message: String,
    },
}
