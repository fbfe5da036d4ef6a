//! Route handling.
//!
//! Maps request paths to handlers and enforces request signing on every
//! route except the handshake.

mod handshake;
mod health;
mod router;
mod traits;

pub use handshake::HandshakeRoute;
pub use health::HealthRoute;
pub use router::Router;
pub use traits::{Route, RouteContext};
