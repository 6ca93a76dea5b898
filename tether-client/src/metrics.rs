//! Client metrics definitions
//!
//! OpenTelemetry instruments for monitoring connection health. Exported
//! to whatever backend `tether_core::init_observability` wires up;
//! recording is a no-op overhead-wise when no provider is installed.
//!
//! # Metrics Collected
//!
//! - **connection.state**: Lifecycle state gauge
//! - **reconnect.attempts**: Scheduled reconnect attempts (counter)
//! - **connects**: Successful opens, first connect and reconnects alike
//! - **heartbeats.sent** / **zombie.closes**: Liveness probe activity
//! - **requests** / **request.duration**: Request volume and latency
//! - **frames.data**: Data frames routed to topic listeners
//! - **errors**: Errors by type

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Instruments for one client
pub struct ClientMetrics {
    /// Lifecycle state (0=idle, 1=connecting, 2=authenticating, 3=open,
    /// 4=closing, 5=reconnect scheduled, 6=closed)
    pub connection_state: Gauge<i64>,
    /// Reconnect attempts scheduled
    pub reconnect_attempts: Counter<u64>,
    /// Successful opens
    pub connects: Counter<u64>,
    /// Pings sent
    pub heartbeats_sent: Counter<u64>,
    /// Connections force-closed by the heartbeat threshold
    pub zombie_closes: Counter<u64>,
    /// Requests by action and status
    pub requests: Counter<u64>,
    /// Request latency in seconds
    pub request_duration: Histogram<f64>,
    /// Data frames routed to listeners
    pub data_frames: Counter<u64>,
    /// Errors by type
    pub errors: Counter<u64>,
}

impl ClientMetrics {
    /// Create instruments under the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create instruments on a caller-supplied meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("tether.client.connection.state")
                .with_description("Connection lifecycle state")
                .build(),
            reconnect_attempts: meter
                .u64_counter("tether.client.reconnect.attempts")
                .with_description("Reconnect attempts scheduled")
                .build(),
            connects: meter
                .u64_counter("tether.client.connects")
                .with_description("Successful connection opens")
                .build(),
            heartbeats_sent: meter
                .u64_counter("tether.client.heartbeats.sent")
                .with_description("Heartbeat pings sent")
                .build(),
            zombie_closes: meter
                .u64_counter("tether.client.zombie.closes")
                .with_description("Connections force-closed after missed heartbeats")
                .build(),
            requests: meter
                .u64_counter("tether.client.requests")
                .with_description("Requests sent, by action and status")
                .build(),
            request_duration: meter
                .f64_histogram("tether.client.request.duration")
                .with_description("Request duration in seconds")
                .build(),
            data_frames: meter
                .u64_counter("tether.client.frames.data")
                .with_description("Data frames routed to topic listeners")
                .build(),
            errors: meter
                .u64_counter("tether.client.errors")
                .with_description("Errors encountered, by type")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    pub fn record_connected(&self) {
        self.connects.add(1, &[]);
    }

    pub fn record_heartbeat_sent(&self) {
        self.heartbeats_sent.add(1, &[]);
    }

    pub fn record_zombie(&self) {
        self.zombie_closes.add(1, &[]);
    }

    pub fn record_request(&self, action: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("action", action.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_data_frame(&self, topic: &str) {
        self.data_frames
            .add(1, &[KeyValue::new("topic", topic.to_string())]);
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors
            .add(1, &[KeyValue::new("error_type", error_type.to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation_and_recording() {
        let metrics = ClientMetrics::new("test-client");

        // Recording without a registered provider must not panic
        metrics.update_connection_state(3);
        metrics.record_reconnect_attempt();
        metrics.record_connected();
        metrics.record_heartbeat_sent();
        metrics.record_zombie();
        metrics.record_request("GET_DATA", "success", 0.05);
        metrics.record_request("GET_DATA", "timeout", 10.0);
        metrics.record_data_frame("contest.1");
        metrics.record_error("protocol");
    }

    #[test]
    fn test_all_connection_states() {
        let metrics = ClientMetrics::new("test-client-states");
        for state in 0..=6 {
            metrics.update_connection_state(state);
        }
    }
}
