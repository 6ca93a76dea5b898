//! Connection lifecycle events
//!
//! The client emits these on a broadcast channel for diagnostics and for
//! UI layers driving a degraded/offline indicator. They are advisory:
//! nothing in the connection lifecycle waits on a subscriber, and a full
//! or absent subscriber never gates correctness.

use std::time::Duration;
use tokio::sync::broadcast;

/// Advisory lifecycle events
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection reached the open, authenticated state
    Connected,
    /// The connection closed; code and reason when the peer supplied them
    Closed {
        code: Option<u16>,
        reason: Option<String>,
    },
    /// A local, non-fatal error: dropped frame, transport hiccup
    Error { message: String },
    /// A reconnect attempt was scheduled
    ReconnectScheduled { attempt: u32, delay: Duration },
}

/// Fan-out sender for lifecycle events
#[derive(Clone)]
pub struct EventSender {
    tx: broadcast::Sender<ConnectionEvent>,
}

impl EventSender {
    pub fn new() -> Self {
        // Slow subscribers lag and drop old events rather than apply
        // backpressure to the connection driver
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring the no-subscribers case
    pub fn emit(&self, event: ConnectionEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let events = EventSender::new();
        events.emit(ConnectionEvent::Connected);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let events = EventSender::new();
        let mut rx = events.subscribe();

        events.emit(ConnectionEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_secs(4),
        });

        match rx.recv().await.unwrap() {
            ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_secs(4));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers_see_the_same_event() {
        let events = EventSender::new();
        let mut rx1 = events.subscribe();
        let mut rx2 = events.subscribe();

        events.emit(ConnectionEvent::Connected);

        assert!(matches!(rx1.recv().await.unwrap(), ConnectionEvent::Connected));
        assert!(matches!(rx2.recv().await.unwrap(), ConnectionEvent::Connected));
    }
}
