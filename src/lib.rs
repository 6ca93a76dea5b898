//! tether - resilient real-time connections
//!
//! This is the main convenience crate that re-exports the tether
//! sub-crates. Use it if you want a single dependency for the client
//! and the protocol types.
//!
//! # Architecture
//!
//! - **tether-core**: Wire frames, codec, close-code classification,
//!   error taxonomy, observability bootstrap
//! - **tether-client**: The connection client: managed lifecycle,
//!   classified reconnection, heartbeat, topic multiplexing
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> tether::core::Result<()> {
//!     let client = ClientBuilder::new("wss://rt.example.com/contests")
//!         .connect()
//!         .await?;
//!
//!     client.subscribe("contest.42", |data| async move {
//!         println!("update: {}", data);
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under stable module names
pub use tether_client as client;
pub use tether_core as core;

// Convenience re-exports of the most commonly used types
pub use tether_client::{
    ClientBuilder, ClientRegistry, ConnectionEvent, ConnectionState, RealtimeClient,
};
pub use tether_core::{ClientFrame, CloseCategory, Error, Result, ServerFrame};
