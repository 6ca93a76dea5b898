//! Wire frame types
//!
//! Every message on a tether connection is a JSON object with a `type`
//! discriminant. Frames split by direction: [`ClientFrame`] is what the
//! client sends, [`ServerFrame`] is what it receives. The two sets are
//! deliberately separate enums so the type system records which side may
//! produce which frame.
//!
//! # Protocol generations
//!
//! The protocol grew over time and two spellings of the subscription
//! verbs exist in the wild (`SUBSCRIBE`/`UNSUBSCRIBE` and the older
//! `JOIN_ROOM`/`LEAVE_ROOM`). Encoding always emits the canonical
//! spelling; decoding accepts both via serde aliases. Inbound data frames
//! similarly come in an enveloped shape (`{"type":"DATA","topic","data"}`)
//! and an older flat shape handled by the codec fallback.
//!
//! # Credential handling
//!
//! The auth frame carries the raw token on the wire, but its `Debug`
//! rendering redacts it. Anything that formats a frame for a log line
//! goes through `Debug`, so a token cannot leak into logs whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Frames sent from client to server
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Authentication handshake, first frame after open when the
    /// credential is not already embedded in the URL
    #[serde(rename = "auth")]
    Auth {
        /// Raw credential; redacted in Debug output
        token: String,
    },

    /// Liveness probe
    #[serde(rename = "ping")]
    Ping {
        /// Milliseconds since the Unix epoch at send time
        timestamp: u64,
    },

    /// Reply to a server-initiated liveness probe
    #[serde(rename = "pong")]
    Pong { timestamp: u64 },

    /// Subscribe intent for a topic
    #[serde(rename = "SUBSCRIBE", alias = "JOIN_ROOM")]
    Subscribe { topic: String },

    /// Unsubscribe intent for a topic
    #[serde(rename = "UNSUBSCRIBE", alias = "LEAVE_ROOM")]
    Unsubscribe { topic: String },

    /// Correlated request expecting a response or acknowledgment
    #[serde(rename = "REQUEST")]
    Request {
        topic: String,
        action: String,
        #[serde(rename = "requestId")]
        request_id: String,
        /// Request payload, spread into the frame body
        #[serde(flatten)]
        payload: serde_json::Map<String, Value>,
    },
}

impl ClientFrame {
    /// Build an auth handshake frame
    pub fn auth(token: impl Into<String>) -> Self {
        ClientFrame::Auth { token: token.into() }
    }

    /// Build a ping frame stamped with the given time
    pub fn ping(timestamp: u64) -> Self {
        ClientFrame::Ping { timestamp }
    }

    /// Build a subscribe-intent frame
    pub fn subscribe(topic: impl Into<String>) -> Self {
        ClientFrame::Subscribe { topic: topic.into() }
    }

    /// Build an unsubscribe frame
    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        ClientFrame::Unsubscribe { topic: topic.into() }
    }

    /// Build a correlated request frame
    ///
    /// Non-object payloads are wrapped under a `payload` key, since the
    /// body fields are spread directly into the frame object.
    pub fn request(
        topic: impl Into<String>,
        action: impl Into<String>,
        request_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        };
        ClientFrame::Request {
            topic: topic.into(),
            action: action.into(),
            request_id: request_id.into(),
            payload,
        }
    }
}

// Manual Debug so the auth token never reaches a log line whole.
impl fmt::Debug for ClientFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFrame::Auth { token } => f
                .debug_struct("Auth")
                .field("token", &redact(token))
                .finish(),
            ClientFrame::Ping { timestamp } => {
                f.debug_struct("Ping").field("timestamp", timestamp).finish()
            }
            ClientFrame::Pong { timestamp } => {
                f.debug_struct("Pong").field("timestamp", timestamp).finish()
            }
            ClientFrame::Subscribe { topic } => {
                f.debug_struct("Subscribe").field("topic", topic).finish()
            }
            ClientFrame::Unsubscribe { topic } => {
                f.debug_struct("Unsubscribe").field("topic", topic).finish()
            }
            ClientFrame::Request {
                topic,
                action,
                request_id,
                ..
            } => f
                .debug_struct("Request")
                .field("topic", topic)
                .field("action", action)
                .field("request_id", request_id)
                .finish(),
        }
    }
}

/// Redact a credential for logging, keeping a short recognizable prefix
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Frames received from the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Explicit acknowledgment of a successful auth handshake
    #[serde(rename = "auth_success")]
    AuthSuccess,

    /// Auth rejection delivered in-band rather than via a close code
    #[serde(rename = "auth_error")]
    AuthError {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        message: Option<String>,
    },

    /// Reply to an outbound ping
    #[serde(rename = "pong")]
    Pong {
        #[serde(default)]
        timestamp: Option<u64>,
    },

    /// Server-initiated liveness probe; answered with a pong
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        timestamp: Option<u64>,
    },

    /// Enveloped data frame for a subscribed topic
    #[serde(rename = "DATA", alias = "MESSAGE")]
    Data { topic: String, data: Value },

    /// Response or acknowledgment correlated to an outbound request
    #[serde(rename = "RESPONSE", alias = "ACKNOWLEDGMENT")]
    Response {
        #[serde(rename = "requestId")]
        request_id: String,
        /// Remaining response fields, collected as-is
        #[serde(flatten)]
        body: Value,
    },
}
