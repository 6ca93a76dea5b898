//! Codec for wire frame serialization and deserialization
//!
//! Encoding is plain serde. Decoding is deliberately tolerant: the only
//! hard requirements on an inbound frame are that it is well-formed JSON,
//! an object, and carries a string `type` discriminant. Frames that meet
//! those requirements but do not match a known typed shape fall back to
//! structural routing (a `requestId` makes it a response, a `topic` makes
//! it a data frame), which is what keeps the client compatible with the
//! older flat protocol generation.
//!
//! Frames that fail validation produce [`Error::Protocol`]; the caller
//! drops them and the connection stays open.
//!
//! # Examples
//!
//! ```rust
//! use tether_core::{codec, ServerFrame};
//!
//! // A flat legacy frame with no DATA envelope still routes by topic
//! let frame = codec::decode(r#"{"type":"PORTFOLIO_UPDATE","topic":"portfolio.9","cash":150}"#).unwrap();
//! assert!(matches!(frame, ServerFrame::Data { .. }));
//! ```

use crate::error::{Error, Result};
use crate::frame::{ClientFrame, ServerFrame};
use serde::Serialize;

/// Encode any serializable frame to a JSON string
pub fn encode<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode an inbound frame, tolerating both protocol generations
///
/// Validation order:
/// 1. Must parse as JSON, and as an object
/// 2. Must carry a string `type` discriminant
/// 3. Known types decode into their typed [`ServerFrame`] variant
/// 4. Unknown types route structurally: `requestId` present means a
///    response, `topic` present means a flat data frame (the whole
///    object becomes the data payload)
///
/// Anything else is a protocol error and should be dropped by the caller.
pub fn decode(data: &str) -> Result<ServerFrame> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| Error::Protocol(format!("invalid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| Error::Protocol("frame is not an object".to_string()))?;

    let frame_type = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Protocol("missing type discriminant".to_string()))?
        .to_string();

    match serde_json::from_value::<ServerFrame>(value.clone()) {
        Ok(frame) => Ok(frame),
        Err(_) => {
            if let Some(request_id) = obj.get("requestId").and_then(|v| v.as_str()) {
                Ok(ServerFrame::Response {
                    request_id: request_id.to_string(),
                    body: value,
                })
            } else if let Some(topic) = obj.get("topic").and_then(|v| v.as_str()) {
                // Flat generation: the frame itself is the payload
                Ok(ServerFrame::Data {
                    topic: topic.to_string(),
                    data: value,
                })
            } else {
                Err(Error::Protocol(format!(
                    "unrecognized frame type: {}",
                    frame_type
                )))
            }
        }
    }
}

/// Decode an outbound frame
///
/// Used by test harnesses that play the server side and need to inspect
/// what the client sent.
pub fn decode_client(data: &str) -> Result<ClientFrame> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}
