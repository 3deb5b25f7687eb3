use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the connection failed (TCP connect, TLS, or the
    /// websocket upgrade).
    #[error("dial {url} failed: {source}")]
    DialFailed {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// A read or write did not complete before its deadline.
    #[error("{op} deadline of {after:?} exceeded")]
    DeadlineExceeded { op: &'static str, after: Duration },
}
