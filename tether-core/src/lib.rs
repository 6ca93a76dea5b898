//! Core wire protocol types and utilities for tether
//!
//! This crate provides the foundation for the tether real-time client:
//!
//! - **Frames**: The JSON wire protocol spoken over the socket (auth,
//!   heartbeat, subscription, request/response, data)
//! - **Codec**: Serialization and tolerant deserialization of frames
//! - **Close classification**: Mapping close codes to reconnect policy inputs
//! - **Error handling**: The error taxonomy shared by all tether crates
//! - **Observability**: OpenTelemetry integration for traces, metrics, and logs
//!
//! # Overview
//!
//! A tether connection is one persistent, bidirectional, message-framed
//! channel (WebSocket) carrying JSON text frames. Every frame carries a
//! `type` discriminant; everything else about the frame depends on that
//! type. This crate owns the frame shapes and the rules for turning raw
//! text into them, but is transport-agnostic: the `tether-client` crate
//! supplies the socket, the reconnection machinery, and the multiplexer
//! on top of these types.
//!
//! # Example
//!
//! ```rust
//! use tether_core::{codec, ClientFrame, ServerFrame};
//!
//! // Encode an outbound subscribe frame
//! let frame = ClientFrame::subscribe("contest.42");
//! let json = codec::encode(&frame).unwrap();
//! assert!(json.contains("\"SUBSCRIBE\""));
//!
//! // Decode an inbound data frame
//! let inbound = codec::decode(r#"{"type":"DATA","topic":"contest.42","data":{"rank":3}}"#).unwrap();
//! assert!(matches!(inbound, ServerFrame::Data { .. }));
//! ```

pub mod close;
pub mod codec;
pub mod error;
pub mod frame;
pub mod observability;

// Re-export the most commonly used types for convenience
pub use close::{classify, CloseCategory};
pub use error::{Error, Result};
pub use frame::{ClientFrame, ServerFrame};
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
