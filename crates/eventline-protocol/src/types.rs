//! Core protocol types for Eventline's wire format.
//!
//! Everything in this module travels "on the wire" as JSON text frames:
//! the handshake the client sends once per connection, and the events the
//! server pushes afterwards.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// The discriminant of an [`Event`] (its `"type"` field on the wire).
///
/// `HealthCheck` is reserved for the server's system message that carries
/// the connection identity. The other named variants are the domain events
/// most consumers match on. Anything else lands in `Other`, so a server
/// that introduces a new event type never breaks decoding.
///
/// `#[serde(from = "String", into = "String")]` makes serde go through
/// the `From` impls below, so the enum is written as a plain string like
/// `"message.new"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// `health.check`: reserved system event carrying the connection id.
    HealthCheck,
    /// `message.new`
    MessageNew,
    /// `message.updated`
    MessageUpdated,
    /// `message.deleted`
    MessageDeleted,
    /// `message.read`
    MessageRead,
    /// `reaction.new`
    ReactionNew,
    /// `reaction.deleted`
    ReactionDeleted,
    /// `member.added`
    MemberAdded,
    /// `member.removed`
    MemberRemoved,
    /// `typing.start`
    TypingStart,
    /// `typing.stop`
    TypingStop,
    /// `user.presence.changed`
    UserPresenceChanged,
    /// `notification.message_new`
    NotificationMessageNew,
    /// Any discriminant this crate does not name.
    Other(String),
}

impl EventType {
    /// Returns the wire representation of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::HealthCheck => "health.check",
            Self::MessageNew => "message.new",
            Self::MessageUpdated => "message.updated",
            Self::MessageDeleted => "message.deleted",
            Self::MessageRead => "message.read",
            Self::ReactionNew => "reaction.new",
            Self::ReactionDeleted => "reaction.deleted",
            Self::MemberAdded => "member.added",
            Self::MemberRemoved => "member.removed",
            Self::TypingStart => "typing.start",
            Self::TypingStop => "typing.stop",
            Self::UserPresenceChanged => "user.presence.changed",
            Self::NotificationMessageNew => "notification.message_new",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "health.check" => Self::HealthCheck,
            "message.new" => Self::MessageNew,
            "message.updated" => Self::MessageUpdated,
            "message.deleted" => Self::MessageDeleted,
            "message.read" => Self::MessageRead,
            "reaction.new" => Self::ReactionNew,
            "reaction.deleted" => Self::ReactionDeleted,
            "member.added" => Self::MemberAdded,
            "member.removed" => Self::MemberRemoved,
            "typing.start" => Self::TypingStart,
            "typing.stop" => Self::TypingStop,
            "user.presence.changed" => Self::UserPresenceChanged,
            "notification.message_new" => Self::NotificationMessageNew,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        match t {
            EventType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One message pushed by the server.
///
/// Only the fields the connection itself needs are typed. Everything else
/// is kept in `payload` exactly as received and handed to the consumer,
/// who knows what a `message.new` or `reaction.new` carries.
///
/// On the wire:
///
/// ```json
/// { "type": "message.new", "connection_id": "abc", "message": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// What kind of event this is.
    #[serde(rename = "type")]
    pub kind: EventType,

    /// Server-assigned identity of the connection. Always present on
    /// health checks; other events may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    /// Every other field of the message, domain data and timestamps
    /// included. Nothing in here is validated.
    ///
    /// `#[serde(flatten)]` collects the fields not named above into this
    /// map when decoding, and writes them back at the top level when
    /// encoding.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Creates an event with no connection id and an empty payload.
    pub fn new(kind: impl Into<EventType>) -> Self {
        Self {
            kind: kind.into(),
            connection_id: None,
            payload: Map::new(),
        }
    }

    /// Creates a health-check event carrying `connection_id`.
    pub fn health_check(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            ..Self::new(EventType::HealthCheck)
        }
    }

    /// Adds a payload field. Handy for building events in tests and tools.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Returns `true` for the reserved system event.
    pub fn is_health_check(&self) -> bool {
        self.kind == EventType::HealthCheck
    }

    /// Looks up one payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Views the payload as a typed struct.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the payload does not match `T`.
    pub fn deserialize_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The user a connection is opened on behalf of.
///
/// Only `id` is required by the server; `name`, `role` and any extra
/// fields are forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user id.
    pub id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Role, e.g. `"user"` or `"admin"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Custom fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Creates a user with just an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
            extra: Map::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Adds a custom field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The handshake a client sends once, right after the connection opens.
///
/// The server answers with a health-check [`Event`] whose
/// `connection_id` identifies the new connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Let the server pick the connection id.
    #[serde(rename = "server_determines_connection_id")]
    pub server_determines_id: bool,

    /// Who is connecting.
    pub user_details: User,
}

impl ConnectRequest {
    /// Creates a request for `user`, letting the server assign the id.
    pub fn new(user: User) -> Self {
        Self {
            server_determines_id: true,
            user_details: user,
        }
    }

    /// Encodes the request as the JSON text frame sent to the server.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if a custom user field cannot be
    /// serialized.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
