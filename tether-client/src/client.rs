//! Real-time client: topic multiplexing over one managed connection
//!
//! This module provides the main `RealtimeClient` type, the public face
//! of the crate. It layers logical subscriptions and request/response
//! exchanges over the single physical connection owned by the
//! [`Connection`] manager.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: Configure via `ClientBuilder` (no I/O happens yet)
//! 2. **Use**: Subscribe to topics, make requests; the first use starts
//!    the connection
//! 3. **Recover**: Disconnections reconnect automatically per policy
//! 4. **Close**: Explicit `close()` tears everything down
//!
//! # Cloning
//!
//! `RealtimeClient` is cheaply cloneable using `Arc` internally. All
//! clones share the same connection, subscriptions, and pending
//! requests, so the client can be handed to as many tasks as needed.

use crate::connection::{Connection, ConnectionState};
use crate::events::ConnectionEvent;
use crate::metrics::ClientMetrics;
use crate::request::RequestTracker;
use crate::topics::{ListenerId, TopicRegistry};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{ClientFrame, Error, Result};
use tokio::sync::broadcast;

/// Multiplexed real-time client
///
/// One instance per logical channel group; see `ClientRegistry` for the
/// shared-instance factory.
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) connection: Arc<Connection>,
    pub(crate) topics: TopicRegistry,
    pub(crate) requests: RequestTracker,
    pub(crate) request_timeout: Duration,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

impl RealtimeClient {
    /// Start the underlying connection
    ///
    /// Usually implicit: `subscribe` and `request` call this themselves.
    /// Idempotent while the connection is active.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Close the connection and cancel all reconnect and heartbeat timers
    ///
    /// In-flight requests fail with `ConnectionClosed`. Listener
    /// registrations survive, so a later `connect()` resubscribes them.
    /// Idempotent.
    pub async fn close(&self) {
        self.connection.close().await;
    }

    /// Current connection state
    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    /// Whether the connection is open and authenticated
    pub async fn is_open(&self) -> bool {
        self.connection.is_open().await
    }

    /// Subscribe to lifecycle events (advisory, for diagnostics and UI)
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.events()
    }

    /// Block until the connection is open, a terminal state, or the deadline
    pub async fn wait_until_open(&self, deadline: Duration) -> Result<()> {
        // Subscribe before the first state check so no transition is missed
        let mut events = self.connection.events();
        let wait = async {
            loop {
                match self.connection.state().await {
                    ConnectionState::Open => return Ok(()),
                    ConnectionState::Closed => return Err(Error::ConnectionClosed),
                    _ => {}
                }
                // Events are advisory, so re-poll the state periodically
                // rather than trusting every transition to produce one
                match tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
                    Ok(Err(broadcast::error::RecvError::Closed)) => {
                        return Err(Error::ConnectionClosed)
                    }
                    Err(_) => {}
                }
            }
        };
        tokio::time::timeout(deadline, wait)
            .await
            .map_err(|_| Error::Transport("timed out waiting for connection to open".to_string()))?
    }

    /// Register a listener for a topic
    ///
    /// The first listener for a topic triggers a subscribe-intent frame,
    /// sent immediately when the connection is already open and exactly
    /// once upon reaching open otherwise. Returns the id used to remove
    /// this listener later.
    pub async fn subscribe<F, Fut>(
        &self,
        topic: impl Into<String>,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = topic.into();
        // Read the state before registering: when not yet open, the
        // driver's open-replay owns the send, so the intent goes out
        // exactly once either way
        let was_open = self.connection.is_open().await;
        let (id, first) = self.topics.add(topic.clone(), listener).await;
        tracing::debug!(topic = %topic, first = first, "Listener registered");

        self.connection.connect().await?;

        if first && was_open {
            self.connection
                .send_frame(&ClientFrame::subscribe(&topic))
                .await?;
        }

        Ok(id)
    }

    /// Remove a listener
    ///
    /// When the topic loses its last listener an unsubscribe frame goes
    /// out best-effort; local cleanup never waits on it, and the
    /// connection stays up for the remaining topics.
    pub async fn unsubscribe(&self, topic: impl AsRef<str>, id: ListenerId) -> Result<()> {
        let topic = topic.as_ref();
        let emptied = self.topics.remove(topic, id).await;

        if emptied && self.connection.is_open().await {
            if let Err(e) = self
                .connection
                .send_frame(&ClientFrame::unsubscribe(topic))
                .await
            {
                tracing::debug!(topic = %topic, error = %e, "Best-effort unsubscribe frame failed");
            }
        }

        Ok(())
    }

    /// Send a correlated request and await its response
    ///
    /// Resolves with the response body, or `RequestTimeout` once the
    /// deadline passes; a response arriving after the timeout is
    /// silently discarded.
    #[tracing::instrument(skip(self, payload), fields(topic = %topic.as_ref(), action = %action.as_ref()))]
    pub async fn request(
        &self,
        topic: impl Into<String> + AsRef<str>,
        action: impl Into<String> + AsRef<str>,
        payload: Value,
    ) -> Result<Value> {
        let topic = topic.into();
        let action = action.into();
        let start = std::time::Instant::now();

        self.connection.connect().await?;

        let id = self.requests.next_id().await;
        let rx = self.requests.register(id.clone()).await;

        let frame = ClientFrame::request(&topic, &action, &id, payload);
        if let Err(e) = self.connection.send_frame(&frame).await {
            self.requests.evict(&id).await;
            if let Some(m) = &self.metrics {
                m.record_request(&action, "send_error", start.elapsed().as_secs_f64());
            }
            return Err(e);
        }

        tracing::debug!(topic = %topic, action = %action, request_id = %id, "Request sent");

        let outcome = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                // Evict so a late response is dropped instead of waking
                // a caller that already gave up
                self.requests.evict(&id).await;
                Err(Error::RequestTimeout)
            }
        };

        if let Some(m) = &self.metrics {
            let status = match &outcome {
                Ok(_) => "success",
                Err(Error::RequestTimeout) => "timeout",
                Err(_) => "error",
            };
            m.record_request(&action, status, start.elapsed().as_secs_f64());
        }

        if let Err(e) = &outcome {
            tracing::warn!(topic = %topic, action = %action, request_id = %id, error = %e, "Request failed");
        }

        outcome
    }

    /// Number of requests currently awaiting a response
    pub async fn pending_requests(&self) -> usize {
        self.requests.pending_count().await
    }

    /// Reconnect attempts since the last successful open
    pub async fn reconnect_attempts(&self) -> u32 {
        self.connection.reconnect_attempts().await
    }

    /// Consecutive connections that died before the rapid threshold
    pub async fn consecutive_rapid_disconnects(&self) -> u32 {
        self.connection.consecutive_rapid_disconnects().await
    }

    /// Topics that currently have at least one listener
    pub async fn subscriptions(&self) -> Vec<String> {
        self.topics.active_topics().await
    }
}
