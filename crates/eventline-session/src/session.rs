//! One physical connection and its two loops.
//!
//! A [`Session`] is created by [`Session::connect`], which dials, sends the
//! handshake, and waits for the server's health check. Once it exists it is
//! `Active`, and [`Session::run`] drives it until something breaks:
//!
//! ```text
//!   Disconnected → Connecting → Handshaking → Active → Closed | Failed
//! ```
//!
//! `run` races a read loop (frames → events → handler) against a keepalive
//! loop (periodic probe). Whichever ends first decides the outcome; the
//! other is dropped and the connection is closed. A session never
//! restarts: reconnecting means building a new `Session`.

use std::fmt;
use std::time::Duration;

use eventline_protocol::{ConnectRequest, decode_event};
use eventline_transport::{Connection, Dialer, SocketId, with_deadline};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{EventHandler, HandshakeError, Identity, SessionError};

/// Payload of the binary keepalive probe.
pub const KEEPALIVE_PROBE: &[u8] = b"ping";

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing for a session.
///
/// The defaults keep the keepalive interval comfortably inside the read
/// deadline, so an idle but healthy connection never times out.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a single read may block before the connection is
    /// considered stalled. Re-armed for every frame.
    pub read_deadline: Duration,

    /// Time between keepalive probes.
    pub keepalive_interval: Duration,

    /// How long a single write (handshake or probe) may take.
    pub write_deadline: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_deadline: Duration::from_secs(35),
            keepalive_interval: Duration::from_secs(28),
            write_deadline: Duration::from_secs(8),
        }
    }
}

impl SessionConfig {
    /// Shortest duration any field is clamped to.
    pub const MIN_DURATION: Duration = Duration::from_millis(1);

    /// Fixes values that would break the loops.
    ///
    /// Called by [`Session::connect`]. A zero interval would panic in
    /// `tokio::time::interval`, and a zero deadline fails every I/O call,
    /// so zero durations are raised to [`Self::MIN_DURATION`].
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("read_deadline", &mut self.read_deadline),
            ("keepalive_interval", &mut self.keepalive_interval),
            ("write_deadline", &mut self.write_deadline),
        ] {
            if *value < Self::MIN_DURATION {
                warn!(field = name, "session duration is zero, clamping");
                *value = Self::MIN_DURATION;
            }
        }
        if self.keepalive_interval >= self.read_deadline {
            debug!(
                keepalive = ?self.keepalive_interval,
                read_deadline = ?self.read_deadline,
                "keepalive interval is not shorter than the read deadline"
            );
        }
        self
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// The first three states only exist inside [`Session::connect`]; a
/// `Session` value you hold is `Active`, `Closed`, or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing dialed yet.
    Disconnected,
    /// Dialing the transport.
    Connecting,
    /// Connected, waiting for the server's health check.
    Handshaking,
    /// Handshake done; ready for (or inside) `run`.
    Active,
    /// Stopped by cancellation.
    Closed,
    /// Stopped by an error.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One connection to the event server.
///
/// The session owns its connection exclusively and its own cancellation
/// token. Cancelling the token is the only way to stop `run` from outside.
pub struct Session<C: Connection> {
    conn: C,
    identity: Identity,
    config: SessionConfig,
    cancel: CancellationToken,
    state: SessionState,
}

impl<C: Connection> Session<C> {
    /// Dials `url`, sends `request`, and waits for the server's health
    /// check.
    ///
    /// On success the health check's `connection_id` has been published to
    /// `identity` and the session is `Active`. On failure the connection
    /// (if any) is closed and no loops were started.
    ///
    /// # Errors
    /// - [`SessionError::Dial`]: the transport could not be established
    /// - [`SessionError::Handshake`]: anything between dial and a valid
    ///   health check went wrong
    /// - [`SessionError::Cancelled`]: `cancel` fired first
    pub async fn connect<D>(
        dialer: &D,
        url: &str,
        request: &ConnectRequest,
        identity: Identity,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError>
    where
        D: Dialer<Connection = C>,
    {
        let config = config.validated();
        debug!(url, state = %SessionState::Connecting, "opening session");

        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            result = dialer.dial(url) => result.map_err(SessionError::Dial)?,
        };

        let mut session = Self {
            conn,
            identity,
            config,
            cancel,
            state: SessionState::Handshaking,
        };
        debug!(socket = %session.conn.id(), state = %session.state, "dialed");

        let outcome = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => Err(SessionError::Cancelled),
            result = session.handshake(request) => result.map_err(SessionError::Handshake),
        };

        match outcome {
            Ok(connection_id) => {
                info!(socket = %session.conn.id(), %connection_id, "session established");
                session.identity.publish(connection_id);
                session.state = SessionState::Active;
                Ok(session)
            }
            Err(e) => {
                session.state = SessionState::Failed;
                session.close_connection().await;
                Err(e)
            }
        }
    }

    /// Sends the connect request and reads exactly one reply, which must
    /// be a health check. Returns its connection id.
    async fn handshake(&self, request: &ConnectRequest) -> Result<String, HandshakeError> {
        let body = request.to_json().map_err(HandshakeError::Encode)?;
        with_deadline("write", self.config.write_deadline, self.conn.send_text(&body))
            .await
            .map_err(HandshakeError::Send)?;

        let payload = with_deadline("read", self.config.read_deadline, self.conn.recv())
            .await
            .map_err(HandshakeError::Read)?
            .ok_or(HandshakeError::ClosedEarly)?;

        let event = decode_event(&payload).map_err(HandshakeError::Decode)?;
        if !event.is_health_check() {
            return Err(HandshakeError::UnexpectedEvent(event.kind));
        }
        event
            .connection_id
            .filter(|id| !id.is_empty())
            .ok_or(HandshakeError::MissingConnectionId)
    }

    /// Runs the read and keepalive loops until one of them stops, then
    /// closes the connection.
    ///
    /// Always returns the error that ended the session:
    /// [`SessionError::Cancelled`] if the token fired (state becomes
    /// `Closed`), anything else otherwise (state becomes `Failed`).
    /// Calling `run` on a session that is not `Active` returns
    /// [`SessionError::NotActive`] without touching the connection.
    pub async fn run<H>(&mut self, handler: &H) -> SessionError
    where
        H: EventHandler + ?Sized,
    {
        if self.state != SessionState::Active {
            return SessionError::NotActive(self.state);
        }

        // First one out wins; the losing loop's future is dropped here,
        // which is what stops it.
        let err = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => SessionError::Cancelled,
            err = self.read_loop(handler) => err,
            err = self.keepalive_loop() => err,
        };

        self.cancel.cancel();
        self.close_connection().await;

        self.state = match err {
            SessionError::Cancelled => SessionState::Closed,
            _ => SessionState::Failed,
        };
        debug!(socket = %self.conn.id(), state = %self.state, error = %err, "session ended");
        err
    }

    /// Reads frames until the transport fails, dispatching domain events
    /// and recording health checks.
    async fn read_loop<H>(&self, handler: &H) -> SessionError
    where
        H: EventHandler + ?Sized,
    {
        loop {
            let payload =
                match with_deadline("read", self.config.read_deadline, self.conn.recv()).await {
                    Ok(Some(payload)) => payload,
                    Ok(None) => return SessionError::Closed,
                    Err(e) => return SessionError::Transport(e),
                };

            let event = match decode_event(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(socket = %self.conn.id(), error = %e, "dropping session on malformed event");
                    return SessionError::Decode(e);
                }
            };

            if event.is_health_check() {
                match event.connection_id {
                    Some(id) if !id.is_empty() => {
                        trace!(socket = %self.conn.id(), connection_id = %id, "health check");
                        self.identity.publish(id);
                    }
                    _ => warn!(
                        socket = %self.conn.id(),
                        "health check without connection id, keeping previous id"
                    ),
                }
                continue;
            }

            trace!(socket = %self.conn.id(), kind = %event.kind, "dispatching event");
            handler.handle(event);
        }
    }

    /// Sends a probe every `keepalive_interval` until a write fails.
    async fn keepalive_loop(&self) -> SessionError {
        let period = self.config.keepalive_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let sent = with_deadline(
                "write",
                self.config.write_deadline,
                self.conn.send(KEEPALIVE_PROBE),
            )
            .await;
            if let Err(e) = sent {
                warn!(socket = %self.conn.id(), error = %e, "keepalive probe failed");
                return SessionError::Transport(e);
            }
            trace!(socket = %self.conn.id(), "sent keepalive probe");
        }
    }

    async fn close_connection(&self) {
        let closed = with_deadline("close", self.config.write_deadline, self.conn.close()).await;
        if let Err(e) = closed {
            debug!(socket = %self.conn.id(), error = %e, "error closing connection");
        }
    }

    /// Returns the connection id from the most recent health check.
    ///
    /// Never blocks, and is safe to call while `run` is updating it.
    pub fn id(&self) -> Option<String> {
        self.identity.get()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns this session's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the local identifier of the underlying connection.
    pub fn socket_id(&self) -> SocketId {
        self.conn.id()
    }
}
