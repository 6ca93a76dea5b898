//! Client factory keyed by logical channel group
//!
//! Features should not each spin up their own connection to the same
//! endpoint. The registry hands out one shared `RealtimeClient` per
//! channel group (the path segment identifying a group of topics), so
//! every caller asking for the same group multiplexes over the same
//! socket.

use crate::builder::ClientBuilder;
use crate::client::RealtimeClient;
use crate::config::ClientConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tether_core::Result;
use tokio::sync::Mutex;

/// Shared-client factory
///
/// Cheap to clone; all clones hand out the same underlying clients.
#[derive(Clone)]
pub struct ClientRegistry {
    base_url: String,
    template: ClientConfig,
    clients: Arc<Mutex<HashMap<String, RealtimeClient>>>,
}

impl ClientRegistry {
    /// Create a registry rooted at a base address
    ///
    /// Group names become path segments under it.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let template = ClientConfig::new(base_url.clone());
        Self {
            base_url,
            template,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a registry whose clients share the given configuration
    ///
    /// The template's endpoint is ignored; each client gets the base
    /// address plus its group path.
    pub fn with_config(base_url: impl Into<String>, template: ClientConfig) -> Self {
        Self {
            base_url: base_url.into(),
            template,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get or create the client for a channel group
    pub async fn client_for(&self, group: &str) -> Result<RealtimeClient> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(group) {
            return Ok(client.clone());
        }

        let mut config = self.template.clone();
        config.endpoint = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            group.trim_start_matches('/')
        );

        tracing::debug!(group = %group, endpoint = %config.endpoint, "Creating client for channel group");
        let client = ClientBuilder::from_config(config).build()?;
        clients.insert(group.to_string(), client.clone());
        Ok(client)
    }

    /// Close every client the registry created
    pub async fn close_all(&self) {
        let clients = self.clients.lock().await;
        for (group, client) in clients.iter() {
            tracing::debug!(group = %group, "Closing client");
            client.close().await;
        }
    }
}
