//! Error types for tether
//!
//! This module defines the error taxonomy for the whole connection
//! lifecycle. The variants split into three tiers that callers should
//! treat differently:
//!
//! - **Terminal**: `AuthUnavailable`, `AuthRejected`, `MaxRetriesExceeded`.
//!   The connection will not recover on its own; the caller must observe
//!   these (rejected future or terminal `Closed` state) and decide what
//!   to do, typically falling back to a degraded mode.
//! - **Recoverable**: `Transport`, `ConnectionClosed`. Handled internally
//!   by the reconnect path; surfaced to callers only on in-flight
//!   operations that were cut off.
//! - **Local**: `Protocol`, `RequestTimeout`, `Serialization`. Scoped to a
//!   single frame or a single request and never affect connection state.
//!
//! # Examples
//!
//! ```rust
//! use tether_core::Error;
//!
//! let err = Error::RequestTimeout;
//! assert_eq!(err.to_string(), "Request timeout");
//! ```

use thiserror::Error;

/// Result type for tether operations
///
/// Convenience alias used throughout the tether crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type covering the full connection lifecycle
///
/// Implemented with `thiserror` so variants carry readable messages and
/// interoperate with `std::error::Error`. The enum is `Clone` because a
/// single failure (for example a dropped socket) has to be delivered to
/// every pending request at once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Authentication is required but no credential is configured
    ///
    /// Raised before any socket is opened. Not retried: a missing token
    /// will not appear by waiting.
    #[error("Authentication required but no credential is available")]
    AuthUnavailable,

    /// The server rejected the configured credential
    ///
    /// Raised after the single elevated-delay auth retry has also failed.
    /// Not retried further: repeating a bad credential will never succeed.
    #[error("Authentication rejected by server")]
    AuthRejected,

    /// Transport layer failure
    ///
    /// Socket-level errors (dial failures, resets, frame errors below the
    /// protocol). These feed the standard reconnect path.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed or unrecognized inbound frame
    ///
    /// The frame is dropped and logged; the connection stays open.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Reconnect attempts exhausted
    ///
    /// The attempt ceiling was reached without a successful connection.
    /// The connection is terminally closed; a fresh `connect()` call is
    /// the only way forward.
    #[error("Maximum reconnect attempts exceeded")]
    MaxRetriesExceeded,

    /// A request did not receive a response within its deadline
    ///
    /// Per-request only: the connection itself is unaffected, and a late
    /// response for the timed-out id is silently discarded.
    #[error("Request timeout")]
    RequestTimeout,

    /// The connection closed while an operation was in flight
    #[error("Connection closed")]
    ConnectionClosed,

    /// Serialization or deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal failure
    ///
    /// Catch-all for conditions that should not occur in normal
    /// operation (setup failures, broken invariants). Prefer the
    /// specific variants wherever one applies.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is terminal for the connection
    ///
    /// Terminal errors mean no further reconnect attempts will be made
    /// without a fresh `connect()` call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Error::AuthUnavailable | Error::AuthRejected | Error::MaxRetriesExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(Error::AuthUnavailable.is_terminal());
        assert!(Error::AuthRejected.is_terminal());
        assert!(Error::MaxRetriesExceeded.is_terminal());

        assert!(!Error::Transport("reset".into()).is_terminal());
        assert!(!Error::Protocol("bad frame".into()).is_terminal());
        assert!(!Error::RequestTimeout.is_terminal());
        assert!(!Error::ConnectionClosed.is_terminal());
    }

    #[test]
    fn test_display_formatting() {
        let err = Error::Transport("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));

        let err = Error::MaxRetriesExceeded;
        assert!(err.to_string().contains("reconnect attempts"));
    }

    #[test]
    fn test_clone_for_fanout() {
        // A single close failure is cloned into every pending request
        let err = Error::ConnectionClosed;
        let copies = vec![err.clone(), err.clone(), err];
        assert!(copies.iter().all(|e| *e == Error::ConnectionClosed));
    }
}
