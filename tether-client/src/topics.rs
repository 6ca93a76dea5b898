//! Topic listener registry
//!
//! Topics are logical channels multiplexed over the one physical
//! connection. Each topic carries a set of listeners; data frames for a
//! topic fan out to every listener registered at dispatch time.
//!
//! The registry is also the durable record of subscribe intent: the
//! connection driver replays a subscribe frame for every active topic
//! each time the connection (re)opens. A listener registered before the
//! connection is open is therefore "queued" simply by being in here.
//!
//! # Listener lifecycle
//!
//! [`add`] returns a [`ListenerId`] plus whether this was the topic's
//! first listener (the caller sends the subscribe intent). [`remove`]
//! reports whether the topic just lost its last listener (the caller
//! sends a best-effort unsubscribe). An empty listener set never touches
//! the underlying connection.
//!
//! [`add`]: TopicRegistry::add
//! [`remove`]: TopicRegistry::remove

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Type for topic listener callbacks
pub type ListenerFn =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Opaque handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener sets keyed by topic
#[derive(Clone)]
pub struct TopicRegistry {
    topics: Arc<Mutex<HashMap<String, HashMap<u64, ListenerFn>>>>,
    next_id: Arc<Mutex<u64>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Register a listener; returns its id and whether the topic is new
    pub async fn add<F, Fut>(&self, topic: impl Into<String>, listener: F) -> (ListenerId, bool)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener: ListenerFn = Arc::new(move |value| Box::pin(listener(value)));

        let id = {
            let mut next = self.next_id.lock().await;
            let id = *next;
            *next += 1;
            id
        };

        let mut topics = self.topics.lock().await;
        let set = topics.entry(topic.into()).or_default();
        let first = set.is_empty();
        set.insert(id, listener);

        (ListenerId(id), first)
    }

    /// Remove a listener; returns true when the topic has no listeners left
    ///
    /// The emptied topic is dropped from the registry so the driver stops
    /// resubscribing to it.
    pub async fn remove(&self, topic: &str, id: ListenerId) -> bool {
        let mut topics = self.topics.lock().await;
        if let Some(set) = topics.get_mut(topic) {
            set.remove(&id.0);
            if set.is_empty() {
                topics.remove(topic);
                return true;
            }
        }
        false
    }

    /// Deliver a data payload to every listener on the topic
    pub async fn dispatch(&self, topic: &str, data: Value) {
        let listeners: Vec<ListenerFn> = {
            let topics = self.topics.lock().await;
            match topics.get(topic) {
                Some(set) => set.values().cloned().collect(),
                None => {
                    tracing::debug!(topic = %topic, "Data frame for topic with no listeners");
                    return;
                }
            }
        };

        // Lock released before listeners run, so a listener can
        // subscribe or unsubscribe without deadlocking
        for listener in listeners {
            listener(data.clone()).await;
        }
    }

    /// Topics that currently have at least one listener
    pub async fn active_topics(&self) -> Vec<String> {
        self.topics.lock().await.keys().cloned().collect()
    }

    /// Whether a topic has any listeners
    pub async fn has_listeners(&self, topic: &str) -> bool {
        self.topics.lock().await.contains_key(topic)
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new()
    }
}
