//! Error types for the session layer.

use eventline_protocol::{EventType, ProtocolError};
use eventline_transport::TransportError;

use crate::SessionState;

/// Errors that can occur while establishing or running a session.
///
/// Everything except [`SessionError::Cancelled`] and
/// [`SessionError::NotActive`] means "this connection is gone, a new one
/// might work". See [`SessionError::is_recoverable`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transport could not be established.
    #[error("dial failed: {0}")]
    Dial(#[source] TransportError),

    /// The connection opened but the handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(#[source] HandshakeError),

    /// A payload received mid-session was not a valid event.
    #[error("malformed event: {0}")]
    Decode(#[source] ProtocolError),

    /// A read or write failed or missed its deadline mid-session.
    #[error("transport failure: {0}")]
    Transport(#[source] TransportError),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Closed,

    /// The session's cancellation token fired.
    #[error("session cancelled")]
    Cancelled,

    /// `run` was called on a session that is not active.
    #[error("session is {0}, not active")]
    NotActive(SessionState),
}

impl SessionError {
    /// Returns `true` if opening a new connection could fix this.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NotActive(_))
    }
}

/// Why a handshake failed.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The connect request could not be encoded.
    #[error("encoding connect request: {0}")]
    Encode(#[source] ProtocolError),

    /// Sending the connect request failed.
    #[error("sending connect request: {0}")]
    Send(#[source] TransportError),

    /// Reading the server's reply failed or timed out.
    #[error("reading reply: {0}")]
    Read(#[source] TransportError),

    /// The server closed the connection before replying.
    #[error("connection closed before reply")]
    ClosedEarly,

    /// The reply was not a valid event.
    #[error("decoding reply: {0}")]
    Decode(#[source] ProtocolError),

    /// The reply was an event, but not a health check.
    #[error("expected health.check, got {0}")]
    UnexpectedEvent(EventType),

    /// The health check carried no connection id.
    #[error("health.check without connection_id")]
    MissingConnectionId,
}
