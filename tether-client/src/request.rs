//! Pending request tracking
//!
//! Outbound requests carry a correlation id; responses arrive
//! asynchronously, possibly out of order, on the shared inbound stream.
//! This module owns the id allocation and the map from id to the oneshot
//! channel the caller is waiting on.
//!
//! # Exactly-once resolution
//!
//! Each id resolves or times out exactly once, never both:
//! - The oneshot sender is consumed on first use, so a response can only
//!   be delivered once
//! - Timeouts evict the id before returning, so a late response finds
//!   nothing and is silently dropped
//!
//! Timeouts themselves live at the call site, which races the receiver
//! against `tokio::time::timeout`.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tether_core::{Error, Result};
use tokio::sync::{oneshot, Mutex};

/// Tracker for in-flight request/response exchanges
#[derive(Clone)]
pub struct RequestTracker {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>,
    counter: Arc<Mutex<u64>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            counter: Arc::new(Mutex::new(0)),
        }
    }

    /// Allocate a fresh correlation id
    pub async fn next_id(&self) -> String {
        let mut counter = self.counter.lock().await;
        let id = *counter;
        *counter += 1;
        format!("req-{}", id)
    }

    /// Register a pending request and return the response channel
    pub async fn register(&self, id: String) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        rx
    }

    /// Deliver a response to whoever is waiting on `id`
    ///
    /// Unknown ids (already timed out, already resolved, never ours) are
    /// ignored.
    pub async fn complete(&self, id: &str, response: Value) {
        if let Some(tx) = self.pending.lock().await.remove(id) {
            let _ = tx.send(Ok(response));
        } else {
            tracing::debug!(request_id = %id, "Dropping response for unknown request id");
        }
    }

    /// Remove a pending request without resolving it
    ///
    /// Called on timeout so that a late response is dropped instead of
    /// waking a caller that already gave up.
    pub async fn evict(&self, id: &str) {
        self.pending.lock().await.remove(id);
    }

    /// Fail every pending request with the same error
    ///
    /// Used when the connection drops with requests still in flight.
    pub async fn fail_all(&self, error: Error) {
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    /// Number of requests currently awaiting a response
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_ids_are_unique() {
        let tracker = RequestTracker::new();
        let a = tracker.next_id().await;
        let b = tracker.next_id().await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id().await;

        let rx = tracker.register(id.clone()).await;
        assert_eq!(tracker.pending_count().await, 1);

        tracker.complete(&id, json!({"status": "ok"})).await;
        assert_eq!(tracker.pending_count().await, 0);

        let response = rx.await.unwrap().unwrap();
        assert_eq!(response["status"], "ok");
    }

    #[tokio::test]
    async fn test_late_response_after_evict_is_dropped() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id().await;

        let rx = tracker.register(id.clone()).await;
        tracker.evict(&id).await;

        // The late response finds nothing to resolve
        tracker.complete(&id, json!({"late": true})).await;

        // The receiver observes a closed channel, not a value
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_complete_unknown_id_is_noop() {
        let tracker = RequestTracker::new();
        tracker.complete("req-999", json!(null)).await;
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_fail_all() {
        let tracker = RequestTracker::new();
        let rx1 = tracker.register("req-0".to_string()).await;
        let rx2 = tracker.register("req-1".to_string()).await;

        tracker.fail_all(Error::ConnectionClosed).await;

        assert_eq!(tracker.pending_count().await, 0);
        assert_eq!(rx1.await.unwrap().unwrap_err(), Error::ConnectionClosed);
        assert_eq!(rx2.await.unwrap().unwrap_err(), Error::ConnectionClosed);
    }
}
