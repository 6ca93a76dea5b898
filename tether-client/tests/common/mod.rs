//! Common test utilities for tether-client integration tests
//!
//! Provides a scriptable mock WebSocket server so client behavior can be
//! exercised without a real backend: reply rules for inbound frames,
//! injected server-side frames, deliberate closes with chosen codes, and
//! dirty drops with no close handshake at all.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tether_client::{BackoffConfig, HeartbeatConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Reply rule: inbound frame text to optional response text
pub type Behavior = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Commands pushed to every live mock connection
#[derive(Clone, Debug)]
pub enum ServerCmd {
    /// Send a text frame
    Send(String),
    /// Close with a code and reason
    Close(u16, String),
    /// Drop the TCP stream with no close handshake
    Drop,
}

/// Scriptable mock WebSocket server
pub struct MockServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    frames_rx: mpsc::Receiver<String>,
    cmd_tx: broadcast::Sender<ServerCmd>,
    accepts: Arc<AtomicUsize>,
    uris: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Server that answers pings with pongs and ignores everything else
    pub async fn new() -> Self {
        Self::with_behavior(Arc::new(pong_behavior)).await
    }

    /// Server that never replies to anything
    pub async fn silent() -> Self {
        Self::with_behavior(Arc::new(|_| None)).await
    }

    /// Server that closes every connection with `code` right after accept
    pub async fn auto_closing(code: u16, reason: &str) -> Self {
        Self::build(Arc::new(|_| None), Some((code, reason.to_string()))).await
    }

    /// Server with a custom reply rule
    pub async fn with_behavior(behavior: Behavior) -> Self {
        Self::build(behavior, None).await
    }

    async fn build(behavior: Behavior, auto_close: Option<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (frames_tx, frames_rx) = mpsc::channel::<String>(256);
        let (cmd_tx, _) = broadcast::channel::<ServerCmd>(32);

        let accepts = Arc::new(AtomicUsize::new(0));
        let uris = Arc::new(Mutex::new(Vec::new()));

        let accept_counter = Arc::clone(&accepts);
        let uri_log = Arc::clone(&uris);
        let conn_cmd_tx = cmd_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        accept_counter.fetch_add(1, Ordering::SeqCst);

                        let behavior = Arc::clone(&behavior);
                        let frames_tx = frames_tx.clone();
                        let cmd_rx = conn_cmd_tx.subscribe();
                        let uri_log = Arc::clone(&uri_log);
                        let auto_close = auto_close.clone();

                        tokio::spawn(async move {
                            serve_connection(stream, behavior, frames_tx, cmd_rx, uri_log, auto_close)
                                .await;
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            frames_rx,
            cmd_tx,
            accepts,
            uris,
        }
    }

    /// WebSocket URL for this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Total connections accepted so far
    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Request URIs of accepted connections, in order
    pub fn captured_uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    /// Push a text frame to every live connection
    pub fn send_all(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(ServerCmd::Send(text.into()));
    }

    /// Close every live connection with the given code
    pub fn close_all(&self, code: u16, reason: &str) {
        let _ = self.cmd_tx.send(ServerCmd::Close(code, reason.to_string()));
    }

    /// Drop every live connection without a close handshake
    pub fn drop_all(&self) {
        let _ = self.cmd_tx.send(ServerCmd::Drop);
    }

    /// Command sender, for driving the server from a spawned task
    pub fn cmd_sender(&self) -> broadcast::Sender<ServerCmd> {
        self.cmd_tx.clone()
    }

    /// Next frame any client sent, within a 5s deadline
    pub async fn wait_for_frame(&mut self) -> Option<String> {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.frames_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next frame matching the predicate, within a 5s deadline
    pub async fn wait_for_frame_matching<F>(&mut self, pred: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.frames_rx.recv()).await {
                Ok(Some(frame)) if pred(&frame) => return Some(frame),
                Ok(Some(_)) => continue,
                _ => return None,
            }
        }
    }

    /// Drain frames already captured, without waiting
    pub fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Shut down the accept loop and all connections
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.cmd_tx.send(ServerCmd::Drop);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    behavior: Behavior,
    frames_tx: mpsc::Sender<String>,
    mut cmd_rx: broadcast::Receiver<ServerCmd>,
    uri_log: Arc<Mutex<Vec<String>>>,
    auto_close: Option<(u16, String)>,
) {
    let callback = |req: &Request, resp: Response| {
        uri_log.lock().unwrap().push(req.uri().to_string());
        Ok(resp)
    };

    let Ok(ws) = accept_hdr_async(stream, callback).await else {
        return;
    };
    let (mut write, mut read) = ws.split();

    if let Some((code, reason)) = auto_close {
        let _ = write
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            })))
            .await;
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = frames_tx.send(text.clone()).await;
                    if let Some(reply) = behavior(&text) {
                        let _ = write.send(Message::Text(reply)).await;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
            cmd = cmd_rx.recv() => match cmd {
                Ok(ServerCmd::Send(text)) => {
                    let _ = write.send(Message::Text(text)).await;
                }
                Ok(ServerCmd::Close(code, reason)) => {
                    let _ = write
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
                Ok(ServerCmd::Drop) | Err(_) => break,
            }
        }
    }
}

/// Default reply rule: answer pings, stay quiet otherwise
pub fn pong_behavior(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    if value["type"] == "ping" {
        Some(
            serde_json::json!({
                "type": "pong",
                "timestamp": value["timestamp"],
            })
            .to_string(),
        )
    } else {
        None
    }
}

/// Reply rule answering every REQUEST with a canned RESPONSE
pub fn responder_behavior(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value["type"].as_str() {
        Some("ping") => pong_behavior(text),
        Some("REQUEST") => Some(
            serde_json::json!({
                "type": "RESPONSE",
                "requestId": value["requestId"],
                "status": "ok",
                "echo": value["action"],
            })
            .to_string(),
        ),
        _ => None,
    }
}

/// Build a data frame for a topic
pub fn data_frame(topic: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "type": "DATA",
        "topic": topic,
        "data": data,
    })
    .to_string()
}

/// Backoff settings scaled down for tests
pub fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        min_spacing: Duration::from_millis(10),
        server_error_floor: Duration::from_millis(20),
        abnormal_close_floor: Duration::from_millis(20),
        rapid_threshold: Duration::from_millis(1),
        rapid_penalty: Duration::from_millis(10),
        rapid_storm_limit: 3,
        storm_floor: Duration::from_millis(100),
        auth_retry_delay: Duration::from_millis(100),
        max_attempts: 5,
        jitter: false,
    }
}

/// Heartbeat settings scaled down for tests
pub fn fast_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_millis(100),
        missed_threshold: 3,
    }
}

/// Heartbeat settings that stay out of the way of a short test
///
/// For tests against a server that never answers pings, where a zombie
/// close mid-test would be noise.
pub fn slow_heartbeat() -> HeartbeatConfig {
    HeartbeatConfig {
        interval: Duration::from_secs(30),
        missed_threshold: 3,
    }
}
