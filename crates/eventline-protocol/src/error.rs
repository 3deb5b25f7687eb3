//! Error types for the protocol layer.
//!
//! Each crate in Eventline defines its own error enum. When you see a
//! `ProtocolError`, the bytes arrived fine but could not be turned into
//! (or out of) a message.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a missing `type` field, or a
    /// field with the wrong JSON type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
