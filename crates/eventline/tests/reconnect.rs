//! Integration tests for the reconnection supervisor.
//!
//! Runs real `EventStream`s against a loopback event server. Dial failures
//! are injected by wrapping the WebSocket dialer, so the server only sees
//! the attempts that got through.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use eventline::prelude::*;
use eventline::transport::{Dialer, TransportError, WebSocketConnection, WebSocketDialer};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Loopback event server
// =========================================================================

/// Starts a server that greets the n-th connection (1-based) with a health
/// check `c-n` and one `message.new` carrying `seq: n`.
///
/// The first `close_first` connections are closed right after that; the
/// rest stay open until the client leaves.
async fn event_server(close_first: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let n = accepted.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                // Handshake.
                if ws.next().await.is_none() {
                    return;
                }
                let greeting = [
                    Event::health_check(format!("c-{n}")),
                    Event::new(EventType::MessageNew).with_field("seq", n as u64),
                ];
                for event in &greeting {
                    let text = serde_json::to_string(event).unwrap();
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                if n <= close_first {
                    let _ = ws.close(None).await;
                }
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    format!("ws://{addr}")
}

// =========================================================================
// Scripted dialer
// =========================================================================

/// Wraps the WebSocket dialer and fails the dials `fail` picks (by 1-based
/// dial number) before they touch the network.
struct FlakyDialer {
    inner: WebSocketDialer,
    dials: Arc<AtomicU32>,
    fail: Box<dyn Fn(u32) -> bool + Send + Sync>,
}

impl FlakyDialer {
    fn new(fail: impl Fn(u32) -> bool + Send + Sync + 'static) -> (Self, Arc<AtomicU32>) {
        let dials = Arc::new(AtomicU32::new(0));
        let dialer = Self {
            inner: WebSocketDialer::default(),
            dials: dials.clone(),
            fail: Box::new(fail),
        };
        (dialer, dials)
    }
}

impl Dialer for FlakyDialer {
    type Connection = WebSocketConnection;

    async fn dial(&self, url: &str) -> Result<WebSocketConnection, TransportError> {
        let n = self.dials.fetch_add(1, Ordering::SeqCst) + 1;
        if (self.fail)(n) {
            return Err(TransportError::DialFailed {
                url: url.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "scripted failure"),
            });
        }
        self.inner.dial(url).await
    }
}

fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        max_attempts,
        delay: Duration::from_millis(10),
        jitter: Duration::ZERO,
    }
}

/// Handler that forwards every event into a channel.
fn forwarder() -> (impl Fn(Event) + Send + Sync + 'static, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |event: Event| {
            let _ = tx.send(event);
        },
        rx,
    )
}

async fn next_seq(rx: &mut mpsc::UnboundedReceiver<Event>) -> u64 {
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("stream dropped the handler");
    assert_eq!(event.kind, EventType::MessageNew);
    event.get("seq").and_then(|v| v.as_u64()).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_recovers_after_transient_dial_failures() {
    // Connection 1 is dropped by the server; then dials 2 and 3 fail and
    // dial 4 gets through and stays up.
    let url = event_server(1).await;
    let (dialer, dials) = FlakyDialer::new(|n| n == 2 || n == 3);

    let stream = EventStream::builder(url, User::new("alice"))
        .reconnect_config(fast_reconnect(5))
        .dialer(dialer)
        .build();
    let handle = stream.handle();
    let (handler, mut events) = forwarder();
    let run = tokio::spawn(stream.run(handler));

    assert_eq!(next_seq(&mut events).await, 1);
    assert_eq!(next_seq(&mut events).await, 2);

    let mut state = handle.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == StreamState::Active),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(handle.id().as_deref(), Some("c-2"));
    assert_eq!(dials.load(Ordering::SeqCst), 4);

    handle.shutdown();
    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, StreamError::Cancelled), "got {err}");
    assert_eq!(handle.state(), StreamState::Closed);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    // Only the first dial succeeds, and the server drops that connection.
    let url = event_server(1).await;
    let (dialer, dials) = FlakyDialer::new(|n| n > 1);

    let stream = EventStream::builder(url, User::new("alice"))
        .reconnect_config(fast_reconnect(3))
        .dialer(dialer)
        .build();
    let handle = stream.handle();
    let (handler, mut events) = forwarder();

    let err = tokio::time::timeout(Duration::from_secs(5), stream.run(handler))
        .await
        .expect("sweep should end on its own");

    match err {
        StreamError::ReconnectExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, SessionError::Dial(_)), "got {last}");
        }
        other => panic!("expected ReconnectExhausted, got {other}"),
    }
    assert_eq!(dials.load(Ordering::SeqCst), 1 + 3);
    assert_eq!(handle.state(), StreamState::Failed);
    // The first connection's event still arrived.
    assert_eq!(next_seq(&mut events).await, 1);
}

#[tokio::test]
async fn test_initial_connect_failure_is_not_retried() {
    let url = event_server(0).await;
    let (dialer, dials) = FlakyDialer::new(|_| true);

    let stream = EventStream::builder(url, User::new("alice"))
        .reconnect_config(fast_reconnect(5))
        .dialer(dialer)
        .build();
    let handle = stream.handle();

    let err = stream.run(|_: Event| {}).await;
    assert!(
        matches!(err, StreamError::Session(SessionError::Dial(_))),
        "got {err}"
    );
    assert_eq!(dials.load(Ordering::SeqCst), 1);
    assert_eq!(handle.state(), StreamState::Failed);
    assert_eq!(handle.id(), None);
}

#[tokio::test]
async fn test_shutdown_while_active_stops_without_redial() {
    let url = event_server(0).await;
    let (dialer, dials) = FlakyDialer::new(|_| false);

    let stream = EventStream::builder(url, User::new("alice"))
        .dialer(dialer)
        .build();
    let handle = stream.handle();
    let (handler, mut events) = forwarder();
    let run = tokio::spawn(stream.run(handler));

    assert_eq!(next_seq(&mut events).await, 1);
    assert_eq!(handle.state(), StreamState::Active);
    assert_eq!(handle.id().as_deref(), Some("c-1"));

    handle.shutdown();
    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown should stop run promptly")
        .unwrap();
    assert!(matches!(err, StreamError::Cancelled), "got {err}");
    assert_eq!(handle.state(), StreamState::Closed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dials.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_during_reconnect_pause() {
    let url = event_server(1).await;
    // Every redial fails, and the pause between attempts is long.
    let (dialer, dials) = FlakyDialer::new(|n| n > 1);

    let stream = EventStream::builder(url, User::new("alice"))
        .reconnect_config(ReconnectConfig {
            max_attempts: 5,
            delay: Duration::from_secs(60),
            jitter: Duration::ZERO,
        })
        .dialer(dialer)
        .build();
    let handle = stream.handle();
    let run = tokio::spawn(stream.run(|_: Event| {}));

    let mut state = handle.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == StreamState::Reconnecting { attempt: 2 }),
    )
    .await
    .expect("should reach the second attempt")
    .unwrap();

    handle.shutdown();
    let err = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown must interrupt the pause")
        .unwrap();
    assert!(matches!(err, StreamError::Cancelled), "got {err}");
    assert_eq!(handle.state(), StreamState::Closed);
    // Initial dial plus the immediate first attempt; the second never ran.
    assert_eq!(dials.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_identity_subscription_follows_reconnects() {
    let url = event_server(1).await;
    let (dialer, _dials) = FlakyDialer::new(|_| false);

    let stream = EventStream::builder(url, User::new("alice"))
        .reconnect_config(fast_reconnect(3))
        .dialer(dialer)
        .build();
    let handle = stream.handle();
    let mut ids = handle.subscribe_id();
    let (handler, mut events) = forwarder();
    let run = tokio::spawn(stream.run(handler));

    assert_eq!(next_seq(&mut events).await, 1);
    assert_eq!(next_seq(&mut events).await, 2);
    tokio::time::timeout(
        Duration::from_secs(5),
        ids.wait_for(|id| id.as_deref() == Some("c-2")),
    )
    .await
    .unwrap()
    .unwrap();

    handle.shutdown();
    run.await.unwrap();
}
