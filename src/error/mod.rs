//! Error types for the auditor gate.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
