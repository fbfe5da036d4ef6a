//! Configuration module for the auditor gate.
//!
//! Handles loading and validating daemon configuration from TOML files.

mod settings;

pub use settings::*;
