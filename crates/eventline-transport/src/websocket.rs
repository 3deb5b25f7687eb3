//! WebSocket client transport implementation using `tokio-tungstenite`.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, Dialer, SocketId, TransportError};

/// Counter for generating unique socket IDs.
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Limits applied to every connection a [`WebSocketDialer`] opens.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Largest reassembled message accepted, in bytes.
    pub max_message_size: usize,
    /// Largest single wire frame accepted, in bytes.
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 << 20,
            max_frame_size: 16 << 20,
        }
    }
}

/// A [`Dialer`] that opens client-side WebSocket connections.
///
/// Masking, fragmentation, and UTF-8 validation of text frames are
/// handled by tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WebSocketDialer {
    config: TransportConfig,
}

impl WebSocketDialer {
    /// Creates a dialer with the given limits.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Dialer for WebSocketDialer {
    type Connection = WebSocketConnection;

    async fn dial(&self, url: &str) -> Result<Self::Connection, TransportError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);
        ws_config.max_frame_size = Some(self.config.max_frame_size);

        let (ws, _response) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false)
                .await
                .map_err(|e| TransportError::DialFailed {
                    url: url.to_string(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        e,
                    ),
                })?;

        let id = SocketId::new(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, url, "dialed WebSocket connection");

        // Split so a read parked on the network never blocks a write.
        let (writer, reader) = ws.split();
        Ok(WebSocketConnection {
            id,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }
}

/// A single client-side WebSocket connection.
pub struct WebSocketConnection {
    id: SocketId,
    writer: Mutex<SplitSink<WsStream, Message>>,
    reader: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn write(&self, msg: Message) -> Result<(), TransportError> {
        self.writer.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.write(Message::Binary(data.to_vec().into())).await
    }

    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.write(Message::Text(text.to_owned().into())).await
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong itself; it goes out on
                    // the next read.
                    tracing::trace!(id = %self.id, "received ping");
                }
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(id = %self.id, "received pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    match frame {
                        Some(f) => tracing::debug!(
                            id = %self.id,
                            code = u16::from(f.code),
                            reason = f.reason.as_str(),
                            "received close frame"
                        ),
                        None => tracing::debug!(id = %self.id, "received close frame"),
                    }
                    return Ok(None);
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!(id = %self.id, len = data.len(), "discarding binary frame");
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.writer.lock().await.close().await {
            Ok(()) => Ok(()),
            // Closing twice, or after the peer hung up, is not an error.
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn id(&self) -> SocketId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_dial_unreachable_fails() {
        // Port 1 on loopback is reserved and never listening.
        let err = WebSocketDialer::default()
            .dial("ws://127.0.0.1:1")
            .await
            .err()
            .expect("dial should fail");
        assert!(matches!(err, TransportError::DialFailed { .. }));
        assert!(err.to_string().contains("ws://127.0.0.1:1"));
    }
}
