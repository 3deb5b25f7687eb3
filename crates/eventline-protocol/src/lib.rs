//! Wire protocol for Eventline.
//!
//! This crate defines what the client and the event server say to each
//! other:
//!
//! - **Types** ([`Event`], [`EventType`], [`ConnectRequest`], [`User`]):
//!   the messages that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`], [`decode_event`]): how
//!   those messages are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! # Architecture
//!
//! ```text
//! Transport (text payloads) → Protocol (Event) → Session (identity, dispatch)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec, decode_event};
pub use error::ProtocolError;
pub use types::{ConnectRequest, Event, EventType, User};
