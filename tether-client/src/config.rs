//! Client configuration
//!
//! Every timing constant in the connection lifecycle lives here rather
//! than in the code that uses it. The defaults are the defensive variant:
//! long heartbeat interval, rapid-disconnect awareness, a ceiling on
//! reconnect attempts. Channels with different criticality override them
//! through the builder.

use std::time::Duration;

/// How the client authenticates a new connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No authentication handshake
    Disabled,
    /// Token appended to the connection URL as a query parameter
    QueryParam,
    /// Explicit auth frame sent as the first message after open
    FirstFrame,
}

/// Authentication settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Credential, if any. Never logged in full.
    pub token: Option<String>,
    pub strategy: AuthStrategy,
    /// How long to wait for an auth verdict after open before assuming
    /// success (absence of an auth error within the window counts)
    pub grace: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            strategy: AuthStrategy::Disabled,
            grace: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    /// Whether a handshake is expected on this connection
    pub fn required(&self) -> bool {
        self.strategy != AuthStrategy::Disabled
    }
}

/// Reconnect delay policy settings
///
/// See `backoff` for how these combine. All durations are floors or
/// inputs to the delay computation, not exact sleep times once jitter
/// is enabled.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// First-attempt base delay; doubles each attempt
    pub base_delay: Duration,
    /// Cap on the exponential base delay
    pub max_delay: Duration,
    /// Minimum spacing between any two consecutive attempts
    pub min_spacing: Duration,
    /// Floor applied when the close was a server-side failure
    pub server_error_floor: Duration,
    /// Floor applied when the close was a dirty disconnect
    pub abnormal_close_floor: Duration,
    /// Connections shorter than this count as rapid disconnects
    pub rapid_threshold: Duration,
    /// Added delay per consecutive rapid disconnect
    pub rapid_penalty: Duration,
    /// Rapid-disconnect count at which the severe floor kicks in
    pub rapid_storm_limit: u32,
    /// Severe floor once the storm limit is reached
    pub storm_floor: Duration,
    /// Fixed elevated delay for the single auth retry
    pub auth_retry_delay: Duration,
    /// Attempt ceiling before surfacing a terminal failure
    pub max_attempts: u32,
    /// Randomize delays upward by up to 25% to avoid thundering herds
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            min_spacing: Duration::from_secs(4),
            server_error_floor: Duration::from_secs(15),
            abnormal_close_floor: Duration::from_secs(5),
            rapid_threshold: Duration::from_secs(5),
            rapid_penalty: Duration::from_secs(5),
            rapid_storm_limit: 3,
            storm_floor: Duration::from_secs(30),
            auth_retry_delay: Duration::from_secs(10),
            max_attempts: 10,
            jitter: false,
        }
    }
}

/// Heartbeat settings
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Ping cadence while the connection is open
    pub interval: Duration,
    /// Missed-pong count at which the connection is presumed dead
    pub missed_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            missed_threshold: 3,
        }
    }
}

/// Full client configuration, assembled by the builder
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, base address plus channel-group path
    pub endpoint: String,
    pub auth: AuthConfig,
    pub backoff: BackoffConfig,
    pub heartbeat: HeartbeatConfig,
    /// Deadline for request/response exchanges
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: AuthConfig::default(),
            backoff: BackoffConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defensive_defaults() {
        let config = ClientConfig::new("ws://localhost:9000/realtime");
        assert_eq!(config.heartbeat.interval, Duration::from_secs(30));
        assert_eq!(config.heartbeat.missed_threshold, 3);
        assert_eq!(config.backoff.max_attempts, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.auth.required());
    }

    #[test]
    fn test_auth_required() {
        let mut auth = AuthConfig::default();
        assert!(!auth.required());

        auth.strategy = AuthStrategy::QueryParam;
        assert!(auth.required());

        auth.strategy = AuthStrategy::FirstFrame;
        assert!(auth.required());
    }
}
