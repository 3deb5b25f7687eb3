//! The identity register: the server-assigned id of the live connection.
//!
//! One writer (the session that owns the connection) and any number of
//! readers on other tasks. Backed by a `tokio::sync::watch` channel, so a
//! read never waits on the writer and readers can also await changes.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared, cheaply cloneable handle to the current connection id.
///
/// A supervisor creates one `Identity` and hands a clone to every session
/// it opens, so the id readers see survives reconnections: it always holds
/// the value from the most recent health check.
#[derive(Debug, Clone)]
pub struct Identity {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Identity {
    /// Creates an empty register.
    pub fn new() -> Self {
        // The initial receiver is dropped; `send_replace` works without
        // any receivers and `subscribe` makes new ones on demand.
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current connection id, if a handshake has completed.
    pub fn get(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Returns a receiver that observes every future change.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    /// Publishes a new id. Only sessions write to the register.
    pub(crate) fn publish(&self, id: String) {
        self.tx.send_replace(Some(id));
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}
