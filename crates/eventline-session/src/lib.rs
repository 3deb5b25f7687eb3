//! Connection sessions for Eventline.
//!
//! This crate owns everything about a single connection to the event
//! server:
//!
//! 1. **Handshake**: dial, send the connect request, wait for the
//!    health check that names the connection ([`Session::connect`])
//! 2. **Loops**: read frames into events and send keepalive probes,
//!    until either fails ([`Session::run`])
//! 3. **Dispatch**: hand every domain event to an [`EventHandler`]
//! 4. **Identity**: publish the server-assigned id to any reader
//!    ([`Identity`])
//!
//! Reconnecting is not this crate's job; a failed session is simply
//! replaced by a new one.
//!
//! # How it fits in the stack
//!
//! ```text
//! Supervisor (above)  ← replaces sessions when they fail
//!     ↕
//! Session Layer (this crate)  ← one connection, two loops
//!     ↕
//! Protocol + Transport (below)  ← events, frames, sockets
//! ```

mod error;
mod identity;
mod session;
mod sink;

pub use error::{HandshakeError, SessionError};
pub use identity::Identity;
pub use session::{KEEPALIVE_PROBE, Session, SessionConfig, SessionState};
pub use sink::EventHandler;
