//! Unix socket server.
//!
//! Accepts local connections and serves framed JSON requests through the
//! router.

mod connection;
mod listener;

pub use connection::handle_connection;
pub use listener::{ConnectionMetrics, SocketListener};
