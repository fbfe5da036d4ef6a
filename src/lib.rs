//! Auditor Gate Library
//!
//! Request authentication for the SEO auditor backend: single-use handshake
//! nonces, HMAC-SHA256 request signatures and replay rejection, served to
//! local clients over a Unix socket.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod protocol;
pub mod routes;
pub mod socket;
