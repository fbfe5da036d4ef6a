//! Configuration settings for the auditor gate.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{EnvSecretProvider, FileSecretProvider, SecretProvider};
use crate::error::DaemonError;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub socket: SocketConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Socket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SocketConfig {
    /// Path to the Unix socket file.
    pub path: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
}

/// Security configuration.
///
/// The signing secret itself never lives in the config file; only where to
/// find it.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Environment variable holding the hex-encoded HMAC secret.
    #[serde(default = "default_hmac_secret_env_var")]
    pub hmac_secret_env_var: String,
    /// Optional file holding the hex-encoded HMAC secret. Takes precedence
    /// over the environment variable.
    #[serde(default)]
    pub hmac_secret_path: Option<PathBuf>,
    /// Nonce time-to-live in seconds.
    #[serde(default = "default_nonce_ttl")]
    pub nonce_ttl_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum message size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum concurrent connections.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Path to the audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,
}

// Default value functions
fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_hmac_secret_env_var() -> String {
    "SEO_AUDITOR_HMAC_SECRET".to_string()
}

fn default_nonce_ttl() -> u64 {
    30 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_message_size() -> usize {
    1_048_576 // 1MB
}

fn default_max_concurrent() -> usize {
    100
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("/var/log/auditor-gate/audit.log")
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hmac_secret_env_var: default_hmac_secret_env_var(),
            hmac_secret_path: None,
            nonce_ttl_seconds: default_nonce_ttl(),
        }
    }
}

impl SecurityConfig {
    /// Build the secret provider this configuration points at.
    pub fn secret_provider(&self) -> Arc<dyn SecretProvider> {
        match &self.hmac_secret_path {
            Some(path) => Arc::new(FileSecretProvider::new(path)),
            None => Arc::new(EnvSecretProvider::new(&self.hmac_secret_env_var)),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: default_audit_log_path(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let settings = Self::parse(&content).map_err(|e| DaemonError::Config {
            message: format!("Failed to load config file '{}': {}", path.display(), e),
        })?;

        Ok(settings)
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, DaemonError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DaemonError::Config {
            message: e.to_string(),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), DaemonError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        // Validate socket permissions format
        if u32::from_str_radix(&self.socket.permissions, 8).is_err() {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid socket permissions '{}'. Must be octal (e.g., '0660')",
                    self.socket.permissions
                ),
            });
        }

        if self.security.nonce_ttl_seconds == 0 {
            return Err(DaemonError::Config {
                message: "security.nonce_ttl_seconds must be greater than zero".to_string(),
            });
        }

        if self.security.hmac_secret_path.is_none()
            && self.security.hmac_secret_env_var.trim().is_empty()
        {
            return Err(DaemonError::Config {
                message: "security.hmac_secret_env_var must not be empty".to_string(),
            });
        }

        if self.limits.max_concurrent_requests == 0 {
            return Err(DaemonError::Config {
                message: "limits.max_concurrent_requests must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}
