//! Audit logging.
//!
//! One JSON line per request recording its method, path and outcome.
//! Credentials and bodies are never written.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditResult};
pub use logger::AuditLogger;
