//! Signing secret resolution.
//!
//! The secret is never cached by the gate: every handshake and every
//! verification asks the provider again, so replacing the secret at its source
//! takes effect without a restart.

use std::fmt;
use std::path::PathBuf;

use zeroize::Zeroizing;

use crate::error::ConfigurationError;

/// Minimum accepted secret length in raw bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Raw HMAC key bytes, wiped from memory on drop.
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl SigningSecret {
    /// Wrap raw key bytes, enforcing the minimum length.
    pub fn new(key_id: &str, bytes: Vec<u8>) -> Result<Self, ConfigurationError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < MIN_SECRET_LEN {
            return Err(ConfigurationError::SecretTooShort {
                key_id: key_id.to_string(),
                len: bytes.len(),
                min: MIN_SECRET_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Decode a hex-encoded secret.
    pub fn from_hex(key_id: &str, encoded: &str) -> Result<Self, ConfigurationError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| ConfigurationError::SecretNotHex {
            key_id: key_id.to_string(),
        })?;
        Self::new(key_id, bytes)
    }

    /// The raw key bytes.
    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Source of the current signing secret.
pub trait SecretProvider: Send + Sync {
    /// Resolve the current secret.
    fn resolve(&self) -> Result<SigningSecret, ConfigurationError>;

    /// Identifier of where the secret lives, safe to hand to clients.
    fn key_id(&self) -> &str;
}

/// Reads a hex-encoded secret from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvSecretProvider {
    env_var: String,
}

impl EnvSecretProvider {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }
}

impl SecretProvider for EnvSecretProvider {
    fn resolve(&self) -> Result<SigningSecret, ConfigurationError> {
        let encoded =
            std::env::var(&self.env_var).map_err(|_| ConfigurationError::SecretMissing {
                key_id: self.env_var.clone(),
            })?;
        SigningSecret::from_hex(&self.env_var, &encoded)
    }

    fn key_id(&self) -> &str {
        &self.env_var
    }
}

/// Reads a hex-encoded secret from a file.
///
/// Security: the file must not be readable by group or others.
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    path: PathBuf,
    key_id: String,
}

impl FileSecretProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key_id = path.display().to_string();
        Self { path, key_id }
    }

    fn unreadable(&self, e: std::io::Error) -> ConfigurationError {
        ConfigurationError::SecretUnreadable {
            key_id: self.key_id.clone(),
            message: e.to_string(),
        }
    }
}

impl SecretProvider for FileSecretProvider {
    fn resolve(&self) -> Result<SigningSecret, ConfigurationError> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigurationError::SecretMissing {
                    key_id: self.key_id.clone(),
                });
            }
            Err(e) => return Err(self.unreadable(e)),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(ConfigurationError::InsecurePermissions {
                    key_id: self.key_id.clone(),
                    mode: mode & 0o777,
                });
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        let encoded = Zeroizing::new(
            std::fs::read_to_string(&self.path).map_err(|e| self.unreadable(e))?,
        );
        SigningSecret::from_hex(&self.key_id, &encoded)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Holds a fixed hex-encoded secret in memory.
///
/// Useful when the host process already resolved the secret, and in tests.
pub struct StaticSecretProvider {
    key_id: String,
    encoded: Option<Zeroizing<String>>,
}

impl StaticSecretProvider {
    pub fn new(key_id: impl Into<String>, encoded: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            encoded: Some(Zeroizing::new(encoded.into())),
        }
    }

    /// A provider with nothing configured; every resolve fails.
    pub fn unset(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            encoded: None,
        }
    }
}

impl SecretProvider for StaticSecretProvider {
    fn resolve(&self) -> Result<SigningSecret, ConfigurationError> {
        match &self.encoded {
            Some(encoded) => SigningSecret::from_hex(&self.key_id, encoded),
            None => Err(ConfigurationError::SecretMissing {
                key_id: self.key_id.clone(),
            }),
        }
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}
