//! Connection management
//!
//! One [`Connection`] owns one physical WebSocket at a time and drives it
//! through the lifecycle:
//!
//! ```text
//! Idle → Connecting → Authenticating → Open → Closing → Closed
//!              ↑                         │
//!              └── ReconnectScheduled ←──┘ (when policy allows retry)
//! ```
//!
//! `Idle` and terminal `Closed` only exit through a fresh `connect()`
//! call. All transitions happen inside a single driver task whose loop
//! selects over socket events, the heartbeat timer, and the shutdown
//! signal, so there is exactly one writer of connection state and one
//! owner of the socket's read half. The write half sits behind a mutex
//! as the single send path shared with the multiplexer.
//!
//! # Reconnection
//!
//! On every close the driver consults the close-code classifier and the
//! backoff policy. Clean closes stay down. Auth rejections get exactly
//! one retry at a fixed elevated delay. Everything else follows the
//! exponential schedule with category floors and rapid-disconnect
//! penalties, up to the attempt ceiling.
//!
//! # Observing frames
//!
//! A [`FrameTap`] passed at construction sees every raw frame in both
//! directions. This is the injection point for diagnostics tooling; it
//! has no way to mutate the socket.

use crate::backoff::BackoffPolicy;
use crate::config::{AuthStrategy, ClientConfig};
use crate::events::{ConnectionEvent, EventSender};
use crate::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use crate::metrics::ClientMetrics;
use crate::request::RequestTracker;
use crate::topics::TopicRegistry;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tether_core::frame::redact;
use tether_core::{classify, codec, ClientFrame, CloseCategory, Error, Result, ServerFrame};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Direction of a tapped frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Inbound,
    Outbound,
}

/// Observer invoked with every raw frame crossing the socket
pub type FrameTap = Arc<dyn Fn(FrameDirection, &str) + Send + Sync>;

/// Connection lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, never connected
    Idle,
    /// Dialing the endpoint
    Connecting,
    /// Socket open, auth verdict pending
    Authenticating,
    /// Authenticated and operational
    Open,
    /// Local close in progress
    Closing,
    /// Waiting out the backoff delay before attempt `attempt`
    ReconnectScheduled { attempt: u32 },
    /// Not connected and not retrying
    Closed,
}

impl ConnectionState {
    /// Gauge encoding for metrics
    fn as_gauge(&self) -> i64 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Authenticating => 2,
            ConnectionState::Open => 3,
            ConnectionState::Closing => 4,
            ConnectionState::ReconnectScheduled { .. } => 5,
            ConnectionState::Closed => 6,
        }
    }
}

/// State shared between the handle and the driver task
struct Shared {
    state: RwLock<ConnectionState>,
    sink: Mutex<Option<WsSink>>,
    shutdown: Notify,
    close_requested: AtomicBool,
    driver_running: AtomicBool,
    reconnect_attempts: AtomicU32,
    rapid_disconnects: AtomicU32,
    events: EventSender,
    tap: Option<FrameTap>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Shared {
    async fn set_state(&self, state: ConnectionState) {
        if let Some(m) = &self.metrics {
            m.update_connection_state(state.as_gauge());
        }
        *self.state.write().await = state;
    }
}

/// Manager for one logical connection
///
/// Cheap to share behind an `Arc`; the multiplexer and any diagnostics
/// code hold references, never the socket itself.
pub struct Connection {
    shared: Arc<Shared>,
    config: ClientConfig,
    requests: RequestTracker,
    topics: TopicRegistry,
}

impl Connection {
    pub(crate) fn new(
        config: ClientConfig,
        requests: RequestTracker,
        topics: TopicRegistry,
        tap: Option<FrameTap>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Idle),
                sink: Mutex::new(None),
                shutdown: Notify::new(),
                close_requested: AtomicBool::new(false),
                driver_running: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                rapid_disconnects: AtomicU32::new(0),
                events: EventSender::new(),
                tap,
                metrics,
            }),
            config,
            requests,
            topics,
        }
    }

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        self.shared.state.read().await.clone()
    }

    /// Whether the connection is open and authenticated
    pub async fn is_open(&self) -> bool {
        matches!(self.state().await, ConnectionState::Open)
    }

    /// Subscribe to lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Reconnect attempts since the last successful open
    pub async fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Consecutive connections that died before the rapid threshold
    pub async fn consecutive_rapid_disconnects(&self) -> u32 {
        self.shared.rapid_disconnects.load(Ordering::SeqCst)
    }

    /// Start the connection driver
    ///
    /// Idempotent: a no-op while a driver is already connecting, open, or
    /// waiting out a reconnect delay. Fails fast with `AuthUnavailable`
    /// when auth is required and no token is configured; no socket is
    /// opened in that case.
    pub async fn connect(&self) -> Result<()> {
        match self.state().await {
            ConnectionState::Connecting
            | ConnectionState::Authenticating
            | ConnectionState::Open
            | ConnectionState::Closing
            | ConnectionState::ReconnectScheduled { .. } => {
                tracing::debug!("connect() ignored, connection already active");
                return Ok(());
            }
            ConnectionState::Idle | ConnectionState::Closed => {}
        }

        if self.config.auth.required() && self.config.auth.token.is_none() {
            tracing::error!("Authentication required but no credential configured");
            return Err(Error::AuthUnavailable);
        }

        if self.shared.driver_running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.shared.close_requested.store(false, Ordering::SeqCst);
        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.shared.set_state(ConnectionState::Connecting).await;

        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let requests = self.requests.clone();
        let topics = self.topics.clone();
        tokio::spawn(async move {
            drive(shared, config, requests, topics).await;
        });

        Ok(())
    }

    /// Close the connection and cancel any pending reconnect
    ///
    /// Safe to call repeatedly; repeat calls are side-effect-free.
    /// In-flight requests are failed immediately with `ConnectionClosed`.
    pub async fn close(&self) {
        if self.shared.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Closing connection");
        if self.shared.driver_running.load(Ordering::SeqCst) {
            self.shared.set_state(ConnectionState::Closing).await;
            self.shared.shutdown.notify_one();
        } else {
            self.shared.set_state(ConnectionState::Closed).await;
        }
        self.requests.fail_all(Error::ConnectionClosed).await;
    }

    /// Send a frame on the single send path
    ///
    /// Fails with `ConnectionClosed` when no socket is up.
    pub async fn send_frame(&self, frame: &ClientFrame) -> Result<()> {
        send_on(&self.shared, frame).await
    }
}

/// Encode and transmit a frame through the shared sink
async fn send_on(shared: &Shared, frame: &ClientFrame) -> Result<()> {
    let text = codec::encode(frame)?;
    if let Some(tap) = &shared.tap {
        tap(FrameDirection::Outbound, &text);
    }
    let mut guard = shared.sink.lock().await;
    match guard.as_mut() {
        Some(sink) => sink
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string())),
        None => Err(Error::ConnectionClosed),
    }
}

fn build_url(config: &ClientConfig) -> String {
    match (&config.auth.strategy, &config.auth.token) {
        (AuthStrategy::QueryParam, Some(token)) => {
            let sep = if config.endpoint.contains('?') { '&' } else { '?' };
            format!("{}{}token={}", config.endpoint, sep, token)
        }
        _ => config.endpoint.clone(),
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Why a session ended
#[derive(Debug)]
enum CloseKind {
    /// Peer sent a close frame (or the stream ended)
    Remote,
    /// Socket-level error
    Transport,
    /// Heartbeat threshold reached with the socket still "open"
    Zombie,
    /// The dial itself failed
    DialFailure,
    /// The server rejected the credential during the handshake
    AuthRejected,
    /// Local close() while the session was up
    Local,
}

#[derive(Debug)]
struct CloseInfo {
    kind: CloseKind,
    code: Option<u16>,
    reason: Option<String>,
    /// How long the session was open, when it got that far
    open_duration: Option<Duration>,
}

impl CloseInfo {
    fn new(kind: CloseKind) -> Self {
        Self {
            kind,
            code: None,
            reason: None,
            open_duration: None,
        }
    }

    fn remote(code: Option<u16>, reason: Option<String>) -> Self {
        Self {
            kind: CloseKind::Remote,
            code,
            reason,
            open_duration: None,
        }
    }

    fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.open_duration = duration;
        self
    }

    fn category(&self) -> CloseCategory {
        match self.kind {
            CloseKind::Remote => classify(
                self.code.unwrap_or(1006),
                self.reason.as_deref().unwrap_or(""),
            ),
            CloseKind::Transport | CloseKind::Zombie => CloseCategory::AbnormalClose,
            CloseKind::DialFailure => CloseCategory::Unknown,
            CloseKind::AuthRejected => CloseCategory::AuthError,
            CloseKind::Local => CloseCategory::Normal,
        }
    }
}

enum AuthOutcome {
    Granted,
    Rejected {
        code: Option<u16>,
        message: Option<String>,
    },
    Lost(CloseInfo),
}

/// The connection driver: one task per connect() cycle
///
/// Owns the read half of the socket for the lifetime of each physical
/// connection and is the only place connection state changes.
async fn drive(
    shared: Arc<Shared>,
    config: ClientConfig,
    requests: RequestTracker,
    topics: TopicRegistry,
) {
    let policy = BackoffPolicy::new(config.backoff.clone());
    let mut auth_retry_spent = false;

    loop {
        if shared.close_requested.load(Ordering::SeqCst) {
            shared.set_state(ConnectionState::Closed).await;
            break;
        }

        shared.set_state(ConnectionState::Connecting).await;
        let url = build_url(&config);
        tracing::info!(
            endpoint = %config.endpoint,
            token = %config.auth.token.as_deref().map(redact).unwrap_or_default(),
            "Connecting"
        );

        let close_info = match connect_async(&url).await {
            Err(e) => {
                tracing::warn!(error = %e, "Connection attempt failed");
                shared.events.emit(ConnectionEvent::Error {
                    message: format!("dial failed: {}", e),
                });
                if let Some(m) = &shared.metrics {
                    m.record_error("dial");
                }
                CloseInfo::new(CloseKind::DialFailure)
            }
            Ok((ws, _)) => {
                let (sink, mut stream) = ws.split();
                *shared.sink.lock().await = Some(sink);

                shared.set_state(ConnectionState::Authenticating).await;
                match authenticate(&shared, &config, &mut stream, &requests, &topics).await {
                    AuthOutcome::Granted => {
                        auth_retry_spent = false;
                        run_session(&shared, &config, &mut stream, &requests, &topics).await
                    }
                    AuthOutcome::Rejected { code, message } => {
                        tracing::warn!(
                            code = ?code,
                            message = ?message,
                            "Authentication rejected"
                        );
                        CloseInfo {
                            kind: CloseKind::AuthRejected,
                            code,
                            reason: message,
                            open_duration: None,
                        }
                    }
                    AuthOutcome::Lost(info) => info,
                }
            }
        };

        // The socket (if any) is gone; drop the send path with it
        *shared.sink.lock().await = None;
        requests.fail_all(Error::ConnectionClosed).await;

        shared.events.emit(ConnectionEvent::Closed {
            code: close_info.code,
            reason: close_info.reason.clone(),
        });

        if shared.close_requested.load(Ordering::SeqCst) {
            shared.set_state(ConnectionState::Closed).await;
            break;
        }

        // Rapid-disconnect accounting, only for sessions that opened.
        // The counter survives long outages; only a long-lived
        // connection clears it.
        if let Some(lifetime) = close_info.open_duration {
            if lifetime < config.backoff.rapid_threshold {
                let n = shared.rapid_disconnects.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(
                    lifetime_ms = lifetime.as_millis() as u64,
                    consecutive = n,
                    "Rapid disconnect"
                );
            } else {
                shared.rapid_disconnects.store(0, Ordering::SeqCst);
            }
        }

        let category = close_info.category();
        if category == CloseCategory::PolicyViolation {
            tracing::warn!(code = ?close_info.code, reason = ?close_info.reason, "Policy violation close");
        }

        if category == CloseCategory::AuthError {
            if auth_retry_spent {
                tracing::error!("Authentication rejected after elevated-delay retry, giving up");
                shared.set_state(ConnectionState::Closed).await;
                shared.events.emit(ConnectionEvent::Error {
                    message: Error::AuthRejected.to_string(),
                });
                break;
            }
            auth_retry_spent = true;
        }

        let attempt = shared.reconnect_attempts.load(Ordering::SeqCst);
        let rapid = shared.rapid_disconnects.load(Ordering::SeqCst);

        match policy.next_delay(attempt, rapid, category) {
            None => {
                if category == CloseCategory::Normal {
                    tracing::info!(code = ?close_info.code, "Connection closed cleanly, not reconnecting");
                } else {
                    tracing::error!(attempt, "Reconnect attempts exhausted");
                    shared.events.emit(ConnectionEvent::Error {
                        message: Error::MaxRetriesExceeded.to_string(),
                    });
                }
                shared.set_state(ConnectionState::Closed).await;
                break;
            }
            Some(delay) => {
                let next_attempt = attempt + 1;
                shared
                    .reconnect_attempts
                    .store(next_attempt, Ordering::SeqCst);
                shared
                    .set_state(ConnectionState::ReconnectScheduled {
                        attempt: next_attempt,
                    })
                    .await;
                shared.events.emit(ConnectionEvent::ReconnectScheduled {
                    attempt: next_attempt,
                    delay,
                });
                if let Some(m) = &shared.metrics {
                    m.record_reconnect_attempt();
                }
                tracing::info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = next_attempt,
                    category = ?category,
                    "Reconnect scheduled"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.shutdown.notified() => {
                        shared.set_state(ConnectionState::Closed).await;
                        break;
                    }
                }
            }
        }
    }

    shared.driver_running.store(false, Ordering::SeqCst);
}

/// Run the auth handshake on a freshly opened socket
///
/// Success is an explicit `auth_success` frame, any ordinary traffic
/// (the server would not serve an unauthenticated socket), or the grace
/// window elapsing without an `auth_error`.
async fn authenticate(
    shared: &Arc<Shared>,
    config: &ClientConfig,
    stream: &mut WsStream,
    requests: &RequestTracker,
    topics: &TopicRegistry,
) -> AuthOutcome {
    if !config.auth.required() {
        return AuthOutcome::Granted;
    }

    if config.auth.strategy == AuthStrategy::FirstFrame {
        if let Some(token) = &config.auth.token {
            if let Err(e) = send_on(shared, &ClientFrame::auth(token)).await {
                tracing::warn!(error = %e, "Failed to send auth frame");
                return AuthOutcome::Lost(CloseInfo::new(CloseKind::Transport));
            }
        }
    }

    let grace = tokio::time::sleep(config.auth.grace);
    tokio::pin!(grace);

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(tap) = &shared.tap {
                        tap(FrameDirection::Inbound, &text);
                    }
                    match codec::decode(&text) {
                        Ok(ServerFrame::AuthSuccess) => {
                            tracing::debug!("Authentication acknowledged");
                            return AuthOutcome::Granted;
                        }
                        Ok(ServerFrame::AuthError { code, message }) => {
                            return AuthOutcome::Rejected { code, message };
                        }
                        Ok(frame) => {
                            // Ordinary traffic before a verdict means the
                            // server accepted us; route it, don't lose it
                            route_frame(shared, requests, topics, frame, None).await;
                            return AuthOutcome::Granted;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping malformed frame during handshake");
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = close_frame_parts(frame);
                    return AuthOutcome::Lost(CloseInfo::remote(code, reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Transport error during handshake");
                    return AuthOutcome::Lost(CloseInfo::new(CloseKind::Transport));
                }
                None => return AuthOutcome::Lost(CloseInfo::new(CloseKind::Transport)),
            },
            _ = &mut grace => {
                tracing::debug!("Auth grace window elapsed without rejection");
                return AuthOutcome::Granted;
            }
            _ = shared.shutdown.notified() => {
                return AuthOutcome::Lost(CloseInfo::new(CloseKind::Local));
            }
        }
    }
}

/// The open-state session loop
///
/// Selects over inbound frames, the heartbeat timer, and shutdown.
/// Returns only when the session is over, with the close details.
async fn run_session(
    shared: &Arc<Shared>,
    config: &ClientConfig,
    stream: &mut WsStream,
    requests: &RequestTracker,
    topics: &TopicRegistry,
) -> CloseInfo {
    shared.set_state(ConnectionState::Open).await;
    shared.reconnect_attempts.store(0, Ordering::SeqCst);
    shared.events.emit(ConnectionEvent::Connected);
    if let Some(m) = &shared.metrics {
        m.record_connected();
    }
    let opened_at = Instant::now();
    tracing::info!("Connection open");

    // Replay subscribe intents for every active topic. This is both the
    // deferred first send for listeners registered before open and the
    // resubscribe after a reconnect.
    for topic in topics.active_topics().await {
        tracing::debug!(topic = %topic, "Sending subscribe intent");
        if let Err(e) = send_on(shared, &ClientFrame::subscribe(&topic)).await {
            tracing::warn!(topic = %topic, error = %e, "Failed to send subscribe intent");
        }
    }

    let mut heartbeat = HeartbeatMonitor::new(config.heartbeat.missed_threshold);
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + config.heartbeat.interval,
        config.heartbeat.interval,
    );

    let elapsed = |info: CloseInfo| info.with_duration(Some(opened_at.elapsed()));

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(tap) = &shared.tap {
                        tap(FrameDirection::Inbound, &text);
                    }
                    match codec::decode(&text) {
                        Ok(frame) => {
                            route_frame(shared, requests, topics, frame, Some(&mut heartbeat)).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping malformed frame");
                            shared.events.emit(ConnectionEvent::Error {
                                message: e.to_string(),
                            });
                            if let Some(m) = &shared.metrics {
                                m.record_error("protocol");
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = close_frame_parts(frame);
                    tracing::info!(code = ?code, reason = ?reason, "Close frame from server");
                    return elapsed(CloseInfo::remote(code, reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Transport error");
                    shared.events.emit(ConnectionEvent::Error {
                        message: e.to_string(),
                    });
                    return elapsed(CloseInfo::new(CloseKind::Transport));
                }
                None => {
                    tracing::info!("Stream ended");
                    return elapsed(CloseInfo::new(CloseKind::Transport));
                }
            },
            _ = ticker.tick() => {
                match heartbeat.on_tick() {
                    HeartbeatAction::SendPing => {
                        if let Some(m) = &shared.metrics {
                            m.record_heartbeat_sent();
                        }
                        if let Err(e) = send_on(shared, &ClientFrame::ping(now_millis())).await {
                            tracing::warn!(error = %e, "Failed to send ping");
                            return elapsed(CloseInfo::new(CloseKind::Transport));
                        }
                    }
                    HeartbeatAction::ForceClose => {
                        tracing::warn!(
                            missed = heartbeat.missed(),
                            "Heartbeat threshold reached, presuming zombie connection"
                        );
                        if let Some(m) = &shared.metrics {
                            m.record_zombie();
                        }
                        return elapsed(CloseInfo::new(CloseKind::Zombie));
                    }
                }
            },
            _ = shared.shutdown.notified() => {
                // Best-effort clean goodbye before tearing down
                let mut guard = shared.sink.lock().await;
                if let Some(sink) = guard.as_mut() {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        })))
                        .await;
                }
                return elapsed(CloseInfo::new(CloseKind::Local));
            }
        }
    }
}

/// Route one decoded inbound frame
///
/// Shared by the handshake (no heartbeat yet) and the open session.
async fn route_frame(
    shared: &Arc<Shared>,
    requests: &RequestTracker,
    topics: &TopicRegistry,
    frame: ServerFrame,
    heartbeat: Option<&mut HeartbeatMonitor>,
) {
    match frame {
        ServerFrame::Pong { .. } => {
            if let Some(hb) = heartbeat {
                hb.on_pong();
            }
        }
        ServerFrame::Ping { timestamp } => {
            let reply = ClientFrame::Pong {
                timestamp: timestamp.unwrap_or_else(now_millis),
            };
            if let Err(e) = send_on(shared, &reply).await {
                tracing::debug!(error = %e, "Failed to answer server ping");
            }
        }
        ServerFrame::AuthSuccess => {}
        ServerFrame::AuthError { code, message } => {
            tracing::warn!(code = ?code, message = ?message, "Auth error frame on open connection");
            shared.events.emit(ConnectionEvent::Error {
                message: format!("auth error: {}", message.unwrap_or_default()),
            });
        }
        ServerFrame::Data { topic, data } => {
            if let Some(m) = &shared.metrics {
                m.record_data_frame(&topic);
            }
            topics.dispatch(&topic, data).await;
        }
        ServerFrame::Response { request_id, body } => {
            requests.complete(&request_id, body).await;
        }
    }
}

fn close_frame_parts(frame: Option<CloseFrame<'_>>) -> (Option<u16>, Option<String>) {
    match frame {
        Some(f) => (Some(f.code.into()), Some(f.reason.into_owned())),
        None => (None, None),
    }
}
