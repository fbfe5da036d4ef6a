//! Audit logger writing JSON lines to an append-only file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::DaemonError;

use super::entry::AuditEntry;

/// Appends audit entries to a file, one JSON object per line.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating it and its parent directory if
    /// needed.
    pub fn new(path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one entry and sync it to disk.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), DaemonError> {
        let line = serde_json::to_string(entry)?;

        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", line)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %entry.request_id,
            path = %entry.path,
            "Audit entry logged"
        );

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
