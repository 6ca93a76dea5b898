//! Client builder
//!
//! The `ClientBuilder` provides a fluent API for configuring a client
//! before it does any I/O. Everything with a timing constant in the
//! connection lifecycle is settable here; the defaults are the defensive
//! variant described in `config`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tether_client::{AuthStrategy, BackoffConfig, ClientBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> tether_core::Result<()> {
//! let client = ClientBuilder::new("wss://rt.example.com/contests")
//!     .auth_token("secret", AuthStrategy::QueryParam)
//!     .request_timeout(Duration::from_secs(10))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::client::RealtimeClient;
use crate::config::{AuthStrategy, BackoffConfig, ClientConfig, HeartbeatConfig};
use crate::connection::{Connection, FrameTap};
use crate::metrics::ClientMetrics;
use crate::request::RequestTracker;
use crate::topics::TopicRegistry;
use std::sync::Arc;
use std::time::Duration;
use tether_core::{Error, ObservabilityConfig, Result};

/// Builder for configuring and creating a `RealtimeClient`
pub struct ClientBuilder {
    config: ClientConfig,
    tap: Option<FrameTap>,
    enable_metrics: bool,
    observability: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a builder for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(endpoint),
            tap: None,
            enable_metrics: false,
            observability: None,
            service_name: None,
        }
    }

    /// Create a builder from an existing configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            tap: None,
            enable_metrics: false,
            observability: None,
            service_name: None,
        }
    }

    /// Configure authentication
    pub fn auth_token(mut self, token: impl Into<String>, strategy: AuthStrategy) -> Self {
        self.config.auth.token = Some(token.into());
        self.config.auth.strategy = strategy;
        self
    }

    /// Require authentication without supplying a credential
    ///
    /// Useful when the credential is resolved elsewhere and may be
    /// missing: `connect()` then fails fast with `AuthUnavailable`
    /// instead of opening a doomed socket.
    pub fn auth_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.config.auth.strategy = strategy;
        self
    }

    /// How long to wait for an auth verdict before assuming success
    pub fn auth_grace(mut self, grace: Duration) -> Self {
        self.config.auth.grace = grace;
        self
    }

    /// Override the reconnect delay policy
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    /// Override the heartbeat cadence and zombie threshold
    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.config.heartbeat = heartbeat;
        self
    }

    /// Deadline for request/response exchanges
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Install an observer for every raw frame in both directions
    pub fn frame_tap(mut self, tap: FrameTap) -> Self {
        self.tap = Some(tap);
        self
    }

    /// Record client metrics (requires an initialized meter provider)
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Initialize full OpenTelemetry observability during build
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability = Some(config);
        self.enable_metrics = true;
        self
    }

    /// Service name for telemetry (used when observability is enabled)
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Assemble the client without touching the network
    ///
    /// The connection starts on the first `connect()`, `subscribe()`, or
    /// `request()` call.
    pub fn build(self) -> Result<RealtimeClient> {
        let metrics = if let Some(mut obs_config) = self.observability {
            if let Some(name) = &self.service_name {
                obs_config.service_name = name.clone();
            }
            let service_name = obs_config.service_name.clone();
            tether_core::init_observability(obs_config).map_err(|e| {
                Error::Internal(format!("failed to initialize observability: {}", e))
            })?;
            Some(Arc::new(ClientMetrics::new(service_name)))
        } else if self.enable_metrics {
            let name = self
                .service_name
                .unwrap_or_else(|| "tether-client".to_string());
            Some(Arc::new(ClientMetrics::new(name)))
        } else {
            None
        };

        let requests = RequestTracker::new();
        let topics = TopicRegistry::new();
        let request_timeout = self.config.request_timeout;

        let connection = Arc::new(Connection::new(
            self.config,
            requests.clone(),
            topics.clone(),
            self.tap,
            metrics.clone(),
        ));

        Ok(RealtimeClient {
            connection,
            topics,
            requests,
            request_timeout,
            metrics,
        })
    }

    /// Build and start connecting
    ///
    /// Returns as soon as the connection driver is running; use
    /// `wait_until_open` to block until the connection is usable.
    pub async fn connect(self) -> Result<RealtimeClient> {
        let client = self.build()?;
        client.connect().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new("ws://localhost:9000/realtime");
        assert_eq!(builder.config.endpoint, "ws://localhost:9000/realtime");
        assert!(builder.config.auth.token.is_none());
        assert!(!builder.enable_metrics);
        assert!(builder.tap.is_none());
    }

    #[test]
    fn test_builder_auth() {
        let builder = ClientBuilder::new("ws://localhost:9000/realtime")
            .auth_token("tok", AuthStrategy::FirstFrame);
        assert_eq!(builder.config.auth.token.as_deref(), Some("tok"));
        assert_eq!(builder.config.auth.strategy, AuthStrategy::FirstFrame);
    }

    #[test]
    fn test_builder_chaining() {
        let builder = ClientBuilder::new("ws://localhost:9000/realtime")
            .request_timeout(Duration::from_secs(3))
            .heartbeat(HeartbeatConfig {
                interval: Duration::from_secs(15),
                missed_threshold: 2,
            })
            .backoff(BackoffConfig {
                max_attempts: 5,
                ..BackoffConfig::default()
            });

        assert_eq!(builder.config.request_timeout, Duration::from_secs(3));
        assert_eq!(builder.config.heartbeat.interval, Duration::from_secs(15));
        assert_eq!(builder.config.backoff.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_build_does_no_io() {
        // Nothing is listening on this port; building must still succeed
        let client = ClientBuilder::new("ws://127.0.0.1:1/unused")
            .build()
            .unwrap();
        assert!(!client.is_open().await);
    }
}
