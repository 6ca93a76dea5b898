//! Resilient real-time connection client
//!
//! This crate provides a WebSocket client built to stay up: it opens a
//! persistent bidirectional connection, authenticates it, keeps it alive
//! with heartbeats, detects silent failure, and recovers from
//! disconnection without hammering a struggling server. Multiple logical
//! topics and request/response exchanges multiplex over the one physical
//! connection.
//!
//! # Core Features
//!
//! - **Managed lifecycle**: A single connection driver owns the socket
//!   and the state machine
//! - **Classified reconnection**: Close codes steer the backoff schedule;
//!   clean closes stay down, auth rejections retry once, server errors
//!   wait longer, rapid-disconnect storms are penalized
//! - **Zombie detection**: Missed-heartbeat counting forces dead-but-open
//!   sockets through the reconnect path
//! - **Topic multiplexing**: Many subscriptions and correlated requests
//!   over one socket, with automatic resubscribe after reconnect
//! - **Observability**: Lifecycle events, tracing, and optional
//!   OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether_client::ClientBuilder;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> tether_core::Result<()> {
//!     let client = ClientBuilder::new("wss://rt.example.com/contests")
//!         .connect()
//!         .await?;
//!
//!     client.subscribe("contest.42", |data| async move {
//!         println!("update: {}", data);
//!     }).await?;
//!
//!     let standings = client
//!         .request("contest.42", "GET_STANDINGS", json!({}))
//!         .await?;
//!     println!("standings: {}", standings);
//!
//!     Ok(())
//! }
//! ```
//!
//! # One client per channel group
//!
//! Features sharing a channel group should share a client; see
//! [`ClientRegistry`]. Six copies of this machinery, one per feature, is
//! exactly the failure mode this crate exists to end.

mod backoff;
mod builder;
mod client;
mod config;
mod connection;
mod events;
mod heartbeat;
mod metrics;
mod registry;
mod request;
mod topics;

pub use backoff::BackoffPolicy;
pub use builder::ClientBuilder;
pub use client::RealtimeClient;
pub use config::{AuthConfig, AuthStrategy, BackoffConfig, ClientConfig, HeartbeatConfig};
pub use connection::{Connection, ConnectionState, FrameDirection, FrameTap};
pub use events::ConnectionEvent;
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use metrics::ClientMetrics;
pub use registry::ClientRegistry;
pub use request::RequestTracker;
pub use topics::{ListenerId, TopicRegistry};
