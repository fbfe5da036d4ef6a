//! Error types for the auditor gate.

use thiserror::Error;

/// Main error type for the daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Authentication errors.
    #[error("Authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// Routing errors.
    #[error("Route error: {kind}")]
    Route { kind: RouteErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Signing secret resolution failures.
///
/// These are deployment faults. Messages name where the secret was expected
/// (`key_id`) and never contain secret material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("HMAC signing secret missing: set {key_id}")]
    SecretMissing { key_id: String },

    #[error("HMAC signing secret in {key_id} must be hex-encoded")]
    SecretNotHex { key_id: String },

    #[error("HMAC signing secret in {key_id} must be at least {min} bytes, got {len}")]
    SecretTooShort { key_id: String, len: usize, min: usize },

    #[error("Failed to read HMAC signing secret from {key_id}: {message}")]
    SecretUnreadable { key_id: String, message: String },

    #[error("HMAC secret file {key_id} has insecure permissions {mode:04o}, expected 0600 or 0400")]
    InsecurePermissions { key_id: String, mode: u32 },
}

/// Authentication error kinds.
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("Missing X-Nonce header")]
    MissingNonce,

    #[error("Missing X-Signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Nonce already used (replay attack detected)")]
    ReplayedNonce,

    #[error("Signing secret unavailable: {source}")]
    SecretUnavailable {
        #[from]
        source: ConfigurationError,
    },

    #[error("Secure random source unavailable")]
    RandomSourceUnavailable,
}

/// Routing error kinds.
#[derive(Error, Debug)]
pub enum RouteErrorKind {
    #[error("No route for path: {path}")]
    NotFound { path: String },

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

impl From<AuthErrorKind> for DaemonError {
    fn from(kind: AuthErrorKind) -> Self {
        DaemonError::Auth { kind }
    }
}

impl From<ConfigurationError> for DaemonError {
    fn from(source: ConfigurationError) -> Self {
        DaemonError::Auth {
            kind: AuthErrorKind::SecretUnavailable { source },
        }
    }
}

impl DaemonError {
    /// Stable machine-readable classification sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::Auth { kind } => match kind {
                AuthErrorKind::MissingNonce => "MISSING_NONCE",
                AuthErrorKind::MissingSignature => "MISSING_SIGNATURE",
                AuthErrorKind::InvalidSignature => "INVALID_SIGNATURE",
                AuthErrorKind::ReplayedNonce => "REPLAYED_NONCE",
                AuthErrorKind::SecretUnavailable { .. } => "CONFIGURATION_ERROR",
                AuthErrorKind::RandomSourceUnavailable => "INTERNAL_ERROR",
            },
            DaemonError::Route { kind } => match kind {
                RouteErrorKind::NotFound { .. } => "NOT_FOUND",
                RouteErrorKind::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            },
            DaemonError::Protocol {
                kind:
                    ProtocolErrorKind::InvalidMessageFormat { .. }
                    | ProtocolErrorKind::MessageTooLarge { .. },
            } => "INVALID_REQUEST",
            _ => "INTERNAL_ERROR",
        }
    }

    /// HTTP-style status for the error class.
    pub fn status(&self) -> u16 {
        match self.code() {
            "MISSING_NONCE" | "MISSING_SIGNATURE" | "INVALID_REQUEST" => 400,
            "INVALID_SIGNATURE" => 401,
            "NOT_FOUND" => 404,
            "METHOD_NOT_ALLOWED" => 405,
            "REPLAYED_NONCE" => 409,
            _ => 500,
        }
    }

    /// Whether the caller can fix this by re-signing or re-handshaking.
    ///
    /// Server-side faults are not caller-recoverable and must not be retried.
    pub fn is_caller_recoverable(&self) -> bool {
        self.status() < 500
    }
}

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_codes_and_statuses() {
        let cases = [
            (AuthErrorKind::MissingNonce, "MISSING_NONCE", 400),
            (AuthErrorKind::MissingSignature, "MISSING_SIGNATURE", 400),
            (AuthErrorKind::InvalidSignature, "INVALID_SIGNATURE", 401),
            (AuthErrorKind::ReplayedNonce, "REPLAYED_NONCE", 409),
        ];

        for (kind, code, status) in cases {
            let err = DaemonError::from(kind);
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
            assert!(err.is_caller_recoverable());
        }
    }

    #[test]
    fn test_configuration_error_is_server_fault() {
        let err = DaemonError::from(ConfigurationError::SecretMissing {
            key_id: "SEO_AUDITOR_HMAC_SECRET".to_string(),
        });
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
        assert_eq!(err.status(), 500);
        assert!(!err.is_caller_recoverable());
    }

    #[test]
    fn test_replay_distinct_from_invalid_signature() {
        let replay = DaemonError::from(AuthErrorKind::ReplayedNonce);
        let invalid = DaemonError::from(AuthErrorKind::InvalidSignature);
        assert_ne!(replay.code(), invalid.code());
        assert_ne!(replay.status(), invalid.status());
    }

    #[test]
    fn test_route_errors() {
        let err = DaemonError::Route {
            kind: RouteErrorKind::NotFound {
                path: "/nope".to_string(),
            },
        };
        assert_eq!(err.status(), 404);

        let err = DaemonError::Route {
            kind: RouteErrorKind::MethodNotAllowed {
                method: "DELETE".to_string(),
                path: "/health".to_string(),
            },
        };
        assert_eq!(err.code(), "METHOD_NOT_ALLOWED");
        assert_eq!(err.status(), 405);
    }

    #[test]
    fn test_malformed_input_is_caller_fault() {
        let cases = [
            ProtocolErrorKind::MessageTooLarge {
                size: 2_000_000,
                max: 1_048_576,
            },
            ProtocolErrorKind::InvalidMessageFormat {
                message: "Invalid JSON".to_string(),
            },
        ];

        for kind in cases {
            let err = DaemonError::Protocol { kind };
            assert_eq!(err.code(), "INVALID_REQUEST");
            assert_eq!(err.status(), 400);
            assert!(err.is_caller_recoverable());
        }
    }

    #[test]
    fn test_secret_message_names_location_only() {
        let err = ConfigurationError::SecretTooShort {
            key_id: "SEO_AUDITOR_HMAC_SECRET".to_string(),
            len: 16,
            min: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("SEO_AUDITOR_HMAC_SECRET"));
        assert!(msg.contains("32"));
    }
}
