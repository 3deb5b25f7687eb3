//! # Eventline
//!
//! Self-healing client for push-based event streams over WebSocket.
//!
//! Eventline opens a connection to an event server, performs the connect
//! handshake, and hands every event the server pushes to your
//! [`EventHandler`](eventline_session::EventHandler). When the connection
//! drops it reconnects on its own, within the limits of a
//! [`ReconnectConfig`], and the caller keeps one logical stream the whole
//! time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventline::prelude::*;
//!
//! # async fn demo() {
//! let stream = EventStream::builder("ws://localhost:8080/connect", User::new("alice")).build();
//! let handle = stream.handle();
//!
//! let err = stream
//!     .run(move |event: Event| {
//!         println!("{} {:?}", event.kind, event.payload);
//!     })
//!     .await;
//! eprintln!("stream stopped: {err} (last id {:?})", handle.id());
//! # }
//! ```

mod config;
mod error;
mod stream;

pub use config::ReconnectConfig;
pub use error::StreamError;
pub use stream::{EventStream, EventStreamBuilder, StreamHandle, StreamState};

// Lower layers, for custom dialers and direct session use.
pub use eventline_protocol as protocol;
pub use eventline_session as session;
pub use eventline_transport as transport;

/// Everything a typical consumer needs.
pub mod prelude {
    pub use crate::{
        EventStream, EventStreamBuilder, ReconnectConfig, StreamError, StreamHandle, StreamState,
    };
    pub use eventline_protocol::{Event, EventType, User};
    pub use eventline_session::{EventHandler, SessionConfig, SessionError};
    pub use eventline_transport::TransportConfig;
}
