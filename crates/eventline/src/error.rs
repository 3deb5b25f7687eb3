//! Unified error type for Eventline.

use eventline_session::SessionError;

/// Why an [`EventStream`](crate::EventStream) stopped.
///
/// Only three outcomes end a running stream: the first connection never
/// came up, a reconnection sweep ran out of attempts, or the stream was
/// shut down. Failures in between are healed by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The initial connect failed, before there was a logical connection
    /// to heal.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Every attempt of a reconnection sweep failed.
    #[error("gave up reconnecting after {attempts} attempts: {last}")]
    ReconnectExhausted {
        /// How many attempts the sweep made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last: SessionError,
    },

    /// [`StreamHandle::shutdown`](crate::StreamHandle::shutdown) was called.
    #[error("stream shut down")]
    Cancelled,
}
