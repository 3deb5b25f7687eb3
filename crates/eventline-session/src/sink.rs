//! The dispatch sink: where decoded domain events go.
//!
//! The session doesn't know what your application does with an event.
//! It calls an [`EventHandler`] once per event, in the order the frames
//! arrived, from the task running the session's read loop.
//!
//! # Backpressure
//!
//! `handle` is synchronous and the read loop waits for it to return
//! before reading the next frame. A slow handler therefore slows down
//! ingestion instead of buffering without bound. If you need to do async
//! work, push the event into a channel and return.

use eventline_protocol::Event;

/// Receives every non-system event a session decodes.
///
/// Calls for one session are sequential, never concurrent with each
/// other. Health-check events are consumed by the session and never
/// reach the handler.
///
/// Any `Fn(Event)` closure that is `Send + Sync + 'static` is a handler:
///
/// ```rust
/// use eventline_session::EventHandler;
/// use eventline_protocol::Event;
///
/// let (tx, _rx) = std::sync::mpsc::channel::<Event>();
/// let tx = std::sync::Mutex::new(tx);
/// let handler = move |event: Event| {
///     let _ = tx.lock().unwrap().send(event);
/// };
/// handler.handle(Event::new("message.new"));
/// ```
pub trait EventHandler: Send + Sync + 'static {
    /// Handles one event. Ownership moves to the handler.
    fn handle(&self, event: Event);
}

impl<F> EventHandler for F
where
    F: Fn(Event) + Send + Sync + 'static,
{
    fn handle(&self, event: Event) {
        self(event)
    }
}
