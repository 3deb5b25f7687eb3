//! Transport abstraction layer for Eventline.
//!
//! Provides the [`Dialer`] and [`Connection`] traits that abstract over the
//! duplex byte stream an event session runs on. The session layer never
//! touches sockets directly: it dials through a [`Dialer`], then reads text
//! payloads and writes probes through a [`Connection`].
//!
//! A [`Connection`] behaves like a frame codec: control frames are answered
//! inline, non-text frames are skipped, and fragmented text messages come
//! back as one contiguous payload.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket client via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{TransportConfig, WebSocketConnection, WebSocketDialer};

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Process-local identifier for one physical connection.
///
/// Used only to correlate log lines; the server-assigned identity of a
/// session lives in the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketId(u64);

impl SocketId {
    /// Creates a new `SocketId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sock-{}", self.0)
    }
}

/// Opens new outbound connections.
///
/// The methods return `impl Future + Send` rather than using `async fn`
/// so that generic callers can move the futures into spawned tasks.
/// Implementors are free to write `async fn`.
pub trait Dialer: Send + Sync + 'static {
    /// The connection type produced by this dialer.
    type Connection: Connection;

    /// Connects to `url` and completes any protocol upgrade.
    ///
    /// # Errors
    /// Returns [`TransportError::DialFailed`] if the peer is unreachable or
    /// the upgrade is rejected.
    fn dial(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single duplex connection.
///
/// `send` and `recv` may be called concurrently from different futures:
/// a read blocked waiting for the peer must not hold up a keepalive write.
pub trait Connection: Send + Sync + 'static {
    /// Sends a binary payload to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a text payload to the remote peer.
    fn send_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next complete text payload from the remote peer.
    ///
    /// Control frames are handled without surfacing and non-text frames
    /// are discarded. Returns `Ok(None)` when the peer closes the
    /// connection (close frame or end of stream).
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the local identifier for this connection.
    fn id(&self) -> SocketId;
}

/// Runs `fut` under a deadline, mapping an elapsed timer to
/// [`TransportError::DeadlineExceeded`].
///
/// A fresh deadline is armed on every call, so wrapping each read keeps a
/// healthy connection alive while a stalled one fails after `after`.
pub async fn with_deadline<T, F>(
    op: &'static str,
    after: Duration,
    fut: F,
) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::DeadlineExceeded { op, after }),
    }
}
