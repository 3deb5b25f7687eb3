//! `EventStream` builder and reconnection supervisor.
//!
//! This is the entry point for consuming an event server. It ties
//! together all the layers: transport → protocol → session, and keeps a
//! logical connection alive across physical ones.

use std::fmt;

use eventline_protocol::{ConnectRequest, User};
use eventline_session::{EventHandler, Identity, Session, SessionConfig, SessionError};
use eventline_transport::{Dialer, TransportConfig, WebSocketDialer};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{ReconnectConfig, StreamError};

// ---------------------------------------------------------------------------
// StreamState
// ---------------------------------------------------------------------------

/// Where the logical connection is, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The first session is being opened.
    Connecting,
    /// A session is live and dispatching events.
    Active,
    /// A session failed; `attempt` of the current sweep is in progress.
    Reconnecting {
        /// 1-based attempt number within the sweep.
        attempt: u32,
    },
    /// Shut down on request.
    Closed,
    /// Gave up: the initial connect or a whole sweep failed.
    Failed,
}

impl StreamState {
    /// Returns `true` once the stream will never change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("connecting"),
            Self::Active => f.write_str("active"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Closed => f.write_str("closed"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring an [`EventStream`].
///
/// # Example
///
/// ```rust,no_run
/// use eventline::prelude::*;
///
/// # async fn demo() {
/// let stream = EventStream::builder("wss://events.example.com/connect", User::new("alice"))
///     .reconnect_config(ReconnectConfig { max_attempts: 10, ..Default::default() })
///     .build();
/// let handle = stream.handle();
///
/// tokio::spawn(async move {
///     let err = stream.run(|event: Event| println!("{}", event.kind)).await;
///     eprintln!("stream ended: {err}");
/// });
///
/// // Later:
/// handle.shutdown();
/// # }
/// ```
pub struct EventStreamBuilder<D = WebSocketDialer> {
    url: String,
    user: User,
    server_determines_id: bool,
    session_config: SessionConfig,
    reconnect_config: ReconnectConfig,
    dialer: D,
}

impl EventStreamBuilder<WebSocketDialer> {
    /// Creates a builder for `url` on behalf of `user`, with default
    /// timing and a WebSocket dialer.
    pub fn new(url: impl Into<String>, user: User) -> Self {
        Self {
            url: url.into(),
            user,
            server_determines_id: true,
            session_config: SessionConfig::default(),
            reconnect_config: ReconnectConfig::default(),
            dialer: WebSocketDialer::default(),
        }
    }

    /// Sets the WebSocket size limits.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.dialer = WebSocketDialer::new(config);
        self
    }
}

impl<D: Dialer> EventStreamBuilder<D> {
    /// Sets the `server_determines_connection_id` handshake flag.
    pub fn server_determines_id(mut self, yes: bool) -> Self {
        self.server_determines_id = yes;
        self
    }

    /// Sets the per-session deadlines and keepalive interval.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the reconnection policy.
    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect_config = config;
        self
    }

    /// Replaces the dialer, e.g. with one that adds auth headers or with a
    /// test double.
    pub fn dialer<D2: Dialer>(self, dialer: D2) -> EventStreamBuilder<D2> {
        EventStreamBuilder {
            url: self.url,
            user: self.user,
            server_determines_id: self.server_determines_id,
            session_config: self.session_config,
            reconnect_config: self.reconnect_config,
            dialer,
        }
    }

    /// Builds the stream. Nothing is dialed until [`EventStream::run`].
    pub fn build(self) -> EventStream<D> {
        let mut request = ConnectRequest::new(self.user);
        request.server_determines_id = self.server_determines_id;

        let (state, _) = watch::channel(StreamState::Connecting);
        EventStream {
            url: self.url,
            request,
            session_config: self.session_config.validated(),
            reconnect_config: self.reconnect_config.validated(),
            dialer: self.dialer,
            identity: Identity::new(),
            state,
            shutdown: CancellationToken::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable view of a running [`EventStream`].
///
/// Everything here is safe to call from any task while `run` is going,
/// and keeps working after `run` returns (reporting the final state).
#[derive(Debug, Clone)]
pub struct StreamHandle {
    identity: Identity,
    state: watch::Receiver<StreamState>,
    shutdown: CancellationToken,
}

impl StreamHandle {
    /// Returns the server-assigned id of the live connection.
    ///
    /// `None` until the first handshake completes. During a reconnection
    /// it still holds the previous connection's id.
    pub fn id(&self) -> Option<String> {
        self.identity.get()
    }

    /// Returns a receiver that observes every change of the connection id.
    pub fn subscribe_id(&self) -> watch::Receiver<Option<String>> {
        self.identity.subscribe()
    }

    /// Returns the current state.
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    /// Stops the stream. `run` closes the live connection (if any) and
    /// returns [`StreamError::Cancelled`]; no reconnection is attempted.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// EventStream
// ---------------------------------------------------------------------------

/// A logical connection to the event server.
///
/// Owns one [`Session`] at a time and replaces it when it fails. Every
/// session shares the stream's [`Identity`], so the id a reader sees is
/// always the one from the most recent health check. Each session gets a
/// child of the stream's shutdown token, so one `shutdown` reaches
/// whatever is in progress: a dial, a handshake, the loops, or the pause
/// between attempts.
pub struct EventStream<D: Dialer = WebSocketDialer> {
    url: String,
    request: ConnectRequest,
    session_config: SessionConfig,
    reconnect_config: ReconnectConfig,
    dialer: D,
    identity: Identity,
    state: watch::Sender<StreamState>,
    shutdown: CancellationToken,
}

impl EventStream<WebSocketDialer> {
    /// Creates a builder. See [`EventStreamBuilder`].
    pub fn builder(url: impl Into<String>, user: User) -> EventStreamBuilder {
        EventStreamBuilder::new(url, user)
    }
}

impl<D: Dialer> EventStream<D> {
    /// Returns a handle for observing and stopping the stream.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            identity: self.identity.clone(),
            state: self.state.subscribe(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Connects and dispatches events to `handler` until the stream stops,
    /// reconnecting after every session failure.
    ///
    /// Returns why it stopped:
    /// - [`StreamError::Session`]: the very first connect failed, or a
    ///   session ended with an error reconnecting cannot fix
    /// - [`StreamError::ReconnectExhausted`]: a whole sweep failed
    /// - [`StreamError::Cancelled`]: [`StreamHandle::shutdown`] was called
    pub async fn run<H: EventHandler>(self, handler: H) -> StreamError {
        self.set_state(StreamState::Connecting);
        let mut session = match self.connect().await {
            Ok(session) => session,
            Err(e) if !e.is_recoverable() => return self.unrecoverable(e),
            Err(e) => {
                self.set_state(StreamState::Failed);
                warn!(url = %self.url, error = %e, "initial connect failed");
                return StreamError::Session(e);
            }
        };
        info!(url = %self.url, connection_id = ?session.id(), "stream connected");

        loop {
            self.set_state(StreamState::Active);
            let cause = session.run(&handler).await;
            drop(session);

            if self.shutdown.is_cancelled() || !cause.is_recoverable() {
                return self.unrecoverable(cause);
            }
            warn!(url = %self.url, error = %cause, "session lost, reconnecting");

            session = match self.reconnect_sweep(cause).await {
                Ok(session) => session,
                Err(e) => return e,
            };
        }
    }

    /// Opens one session under a fresh child token.
    async fn connect(&self) -> Result<Session<D::Connection>, SessionError> {
        Session::connect(
            &self.dialer,
            &self.url,
            &self.request,
            self.identity.clone(),
            self.session_config.clone(),
            self.shutdown.child_token(),
        )
        .await
    }

    /// Tries up to `max_attempts` times to open a replacement session.
    async fn reconnect_sweep(
        &self,
        cause: SessionError,
    ) -> Result<Session<D::Connection>, StreamError> {
        let max_attempts = self.reconnect_config.max_attempts;
        let mut last = cause;

        for attempt in 1..=max_attempts {
            self.set_state(StreamState::Reconnecting { attempt });

            let pause = self.reconnect_config.pause_before(attempt);
            if !pause.is_zero() {
                debug!(attempt, ?pause, "waiting before reconnect attempt");
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return Err(self.cancelled()),
                    _ = tokio::time::sleep(pause) => {}
                }
            }

            match self.connect().await {
                Ok(session) => {
                    info!(
                        url = %self.url,
                        attempt,
                        connection_id = ?session.id(),
                        "reconnected"
                    );
                    return Ok(session);
                }
                Err(e) if !e.is_recoverable() => return Err(self.unrecoverable(e)),
                Err(e) => {
                    warn!(url = %self.url, attempt, max_attempts, error = %e, "reconnect attempt failed");
                    last = e;
                }
            }
        }

        self.set_state(StreamState::Failed);
        error!(url = %self.url, attempts = max_attempts, error = %last, "giving up on stream");
        Err(StreamError::ReconnectExhausted {
            attempts: max_attempts,
            last,
        })
    }

    /// Ends the stream on an error a new session would not fix. After a
    /// shutdown that is always [`StreamError::Cancelled`].
    fn unrecoverable(&self, cause: SessionError) -> StreamError {
        if self.shutdown.is_cancelled() {
            return self.cancelled();
        }
        self.set_state(StreamState::Failed);
        error!(url = %self.url, error = %cause, "session error is not recoverable");
        StreamError::Session(cause)
    }

    fn cancelled(&self) -> StreamError {
        self.set_state(StreamState::Closed);
        info!(url = %self.url, "stream shut down");
        StreamError::Cancelled
    }

    fn set_state(&self, next: StreamState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "stream state");
        }
    }
}
