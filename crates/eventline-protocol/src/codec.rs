//! Codec trait and the event decoder.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The session layer only needs two things from it: encode the
//! [`ConnectRequest`](crate::ConnectRequest) once, and decode every text
//! payload the server pushes into an [`Event`].

use serde::{Serialize, de::DeserializeOwned};

use crate::{Event, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside long-running
/// session tasks that Tokio may move between threads.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`), the event server's
/// wire format.
///
/// ## Example
///
/// ```rust
/// use eventline_protocol::{Codec, Event, EventType, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"type":"message.new","text":"hi"}"#;
///
/// let event: Event = codec.decode(bytes).unwrap();
/// assert_eq!(event.kind, EventType::MessageNew);
/// assert_eq!(event.get("text").unwrap(), "hi");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

/// Decodes one text payload into an [`Event`].
///
/// This is the whole event decoder: structure is checked (valid JSON
/// object with a string `type`), the domain fields are not. Validating
/// those is up to whoever consumes the event.
///
/// # Errors
/// Returns [`ProtocolError::Decode`] on malformed JSON or a missing or
/// non-string `type`.
pub fn decode_event(payload: &[u8]) -> Result<Event, ProtocolError> {
    JsonCodec.decode(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectRequest, EventType, User};

    #[test]
    fn test_decode_health_check() {
        let event =
            decode_event(br#"{"type":"health.check","connection_id":"c-1"}"#).unwrap();
        assert!(event.is_health_check());
        assert_eq!(event.connection_id.as_deref(), Some("c-1"));
        assert!(event.payload.is_empty());
    }

    #[test]
    fn test_decode_domain_event_keeps_payload_verbatim() {
        let event = decode_event(
            br#"{"type":"reaction.new","created_at":"2024-01-01T00:00:00Z",
                 "reaction":{"type":"like","score":1},"cid":"messaging:general"}"#,
        )
        .unwrap();

        assert_eq!(event.kind, EventType::ReactionNew);
        assert_eq!(event.connection_id, None);
        assert_eq!(event.get("created_at").unwrap(), "2024-01-01T00:00:00Z");
        assert_eq!(
            event.get("reaction").unwrap(),
            &serde_json::json!({ "type": "like", "score": 1 })
        );
        assert_eq!(event.get("cid").unwrap(), "messaging:general");
    }

    #[test]
    fn test_decode_does_not_type_check_domain_fields() {
        let event = decode_event(
            br#"{"type":"message.new","created_at":1700000000,"message":null}"#,
        )
        .unwrap();
        assert_eq!(event.kind, EventType::MessageNew);
        assert_eq!(event.get("created_at").unwrap(), 1700000000);
        assert_eq!(event.get("message"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn test_decode_unknown_type_succeeds() {
        let event = decode_event(br#"{"type":"brand.new.thing"}"#).unwrap();
        assert_eq!(event.kind, EventType::Other("brand.new.thing".into()));
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"type":"message.new""#,
            br#"{"connection_id":"c-1"}"#,
            br#"{"type":42}"#,
            br#"["health.check"]"#,
        ];
        for bad in cases {
            assert!(
                matches!(decode_event(bad), Err(ProtocolError::Decode(_))),
                "{} should fail to decode",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn test_encode_connect_request() {
        let bytes = JsonCodec
            .encode(&ConnectRequest::new(User::new("u1")))
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#""server_determines_connection_id":true"#));
        assert!(text.contains(r#""user_details":{"id":"u1"}"#));
    }
}
