//! Cache of live MCP clients keyed by [`ConnectionKey`].
//!
//! Each key maps to a once-cell, so concurrent `ensure_connected` calls for
//! the same key wait on one connect attempt instead of opening a second
//! connection. A failed attempt leaves no entry behind, a connect that
//! finishes after its key was closed is discarded, and a cached client
//! whose transport has ended is replaced on the next call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;

use aetherlink_core::{ConnectionKey, McpServer};

use crate::client::{ClientInfo, McpClient, McpClientError};
use crate::transport::TransportProvider;

type Slot = Arc<OnceCell<Arc<McpClient>>>;

pub struct ConnectionManager {
    provider: Arc<dyn TransportProvider>,
    client_info: ClientInfo,
    connections: StdMutex<HashMap<ConnectionKey, Slot>>,
}

impl ConnectionManager {
    pub fn new(provider: Arc<dyn TransportProvider>, client_info: ClientInfo) -> Self {
        Self {
            provider,
            client_info,
            connections: StdMutex::new(HashMap::new()),
        }
    }

    fn connections(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionKey, Slot>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached client for the server's key, connecting if needed.
    pub async fn ensure_connected(
        &self,
        server: &McpServer,
    ) -> Result<Arc<McpClient>, McpClientError> {
        let key = server.connection_key();
        let slot = {
            let mut connections = self.connections();
            let stale = connections
                .get(&key)
                .and_then(|slot| slot.get())
                .is_some_and(|client| client.is_closed());
            if stale {
                tracing::info!(connection = %key, "Cached MCP connection ended, reconnecting");
                connections.remove(&key);
            }
            Arc::clone(connections.entry(key.clone()).or_default())
        };

        match slot.get_or_try_init(|| self.connect(server)).await {
            Ok(client) => {
                // A close for this key while connecting discards the new client.
                let current = self
                    .connections()
                    .get(&key)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot));
                if !current {
                    tracing::info!(connection = %key, "MCP connection closed while connecting");
                    client.close().await;
                    return Err(McpClientError::Closed);
                }
                Ok(Arc::clone(client))
            }
            Err(e) => {
                let mut connections = self.connections();
                if connections
                    .get(&key)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.get().is_none())
                {
                    connections.remove(&key);
                }
                Err(e)
            }
        }
    }

    async fn connect(&self, server: &McpServer) -> Result<Arc<McpClient>, McpClientError> {
        tracing::info!(
            server_name = %server.name,
            server_type = %server.server_type,
            "Connecting to MCP server"
        );
        let transport = self.provider.create(server).inspect_err(|e| {
            tracing::error!(server_name = %server.name, error = %e, "Cannot build MCP transport");
        })?;

        let timeout = Duration::from_secs(server.timeout_secs.max(1));
        match McpClient::connect(transport, &self.client_info, &id_prefix(&server.name), timeout)
            .await
        {
            Ok(client) => {
                tracing::info!(server_name = %server.name, "Connected to MCP server");
                Ok(Arc::new(client))
            }
            Err(e) => {
                tracing::error!(server_name = %server.name, error = %e, "MCP connection failed");
                Err(e)
            }
        }
    }

    /// Cached client for a key, if connected.
    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<McpClient>> {
        self.connections()
            .get(key)
            .and_then(|slot| slot.get().cloned())
            .filter(|client| !client.is_closed())
    }

    pub fn is_connected(&self, key: &ConnectionKey) -> bool {
        self.get(key).is_some()
    }

    /// Close and forget the client for `key`. Returns whether one was cached.
    pub async fn close(&self, key: &ConnectionKey) -> bool {
        let slot = self.connections().remove(key);
        let Some(client) = slot.and_then(|slot| slot.get().cloned()) else {
            return false;
        };
        client.close().await;
        tracing::info!(connection = %key, "Closed MCP connection");
        true
    }

    /// Close every cached client.
    pub async fn close_all(&self) {
        let slots: Vec<(ConnectionKey, Slot)> = self.connections().drain().collect();
        for (key, slot) in slots {
            if let Some(client) = slot.get() {
                client.close().await;
                tracing::debug!(connection = %key, "Closed MCP connection");
            }
        }
    }

    pub fn connected_keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> = self
            .connections()
            .iter()
            .filter(|(_, slot)| slot.get().is_some_and(|client| !client.is_closed()))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// Request id prefix derived from a server name.
fn id_prefix(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{ThinkingServer, serve};
    use crate::transport::{
        InMemoryTransport, PlatformContext, Transport, TransportError, TransportFactory,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts transports built by the real factory.
    struct CountingProvider {
        inner: TransportFactory,
        created: AtomicUsize,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: TransportFactory::new(PlatformContext::native()),
                created: AtomicUsize::new(0),
            })
        }
    }

    impl TransportProvider for CountingProvider {
        fn create(&self, server: &McpServer) -> Result<Arc<dyn Transport>, TransportError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.inner.create(server)
        }
    }

    fn manager(provider: Arc<CountingProvider>) -> ConnectionManager {
        ConnectionManager::new(provider, ClientInfo::default())
    }

    #[tokio::test]
    async fn test_same_key_reuses_client() {
        let provider = CountingProvider::new();
        let manager = manager(provider.clone());

        let a = McpServer::new_in_memory("a", "@aether/memory");
        let b = McpServer::new_in_memory("b", "@aether/memory");
        let first = manager.ensure_connected(&a).await.unwrap();
        let second = manager.ensure_connected(&b).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_connects_share_one_attempt() {
        let provider = CountingProvider::new();
        let manager = manager(provider.clone());
        let server = McpServer::new_in_memory("t", "@aether/sequentialthinking");

        let (a, b, c) = tokio::join!(
            manager.ensure_connected(&server),
            manager.ensure_connected(&server),
            manager.ensure_connected(&server),
        );
        let a = a.unwrap();
        assert!(Arc::ptr_eq(&a, &b.unwrap()));
        assert!(Arc::ptr_eq(&a, &c.unwrap()));
        assert_eq!(provider.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_no_entry() {
        let manager = manager(CountingProvider::new());
        let server = McpServer::new_in_memory("x", "@aether/unknown");

        let err = manager.ensure_connected(&server).await.err().unwrap();
        assert!(matches!(
            err,
            McpClientError::Transport(TransportError::UnknownBuiltin(_))
        ));
        assert!(manager.connected_keys().is_empty());
        assert!(manager.connections().is_empty());
    }

    #[tokio::test]
    async fn test_close_then_reconnect_builds_new_client() {
        let provider = CountingProvider::new();
        let manager = manager(provider.clone());
        let server = McpServer::new_in_memory("f", "@aether/fetch");
        let key = server.connection_key();

        let first = manager.ensure_connected(&server).await.unwrap();
        assert!(manager.is_connected(&key));
        assert!(manager.close(&key).await);
        assert!(first.is_closed());
        assert!(!manager.close(&key).await);

        let second = manager.ensure_connected(&server).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(provider.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_client_is_replaced() {
        let provider = CountingProvider::new();
        let manager = manager(provider.clone());
        let server = McpServer::new_in_memory("f", "@aether/fetch");

        let first = manager.ensure_connected(&server).await.unwrap();
        first.close().await;
        let second = manager.ensure_connected(&server).await.unwrap();
        assert!(!second.is_closed());
        assert_eq!(provider.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_all() {
        let manager = manager(CountingProvider::new());
        manager
            .ensure_connected(&McpServer::new_in_memory("a", "@aether/memory"))
            .await
            .unwrap();
        manager
            .ensure_connected(&McpServer::new_in_memory("b", "@aether/fetch"))
            .await
            .unwrap();
        assert_eq!(manager.connected_keys().len(), 2);

        manager.close_all().await;
        assert!(manager.connected_keys().is_empty());
    }

    /// Serves the thinking server over a linked pair after a delay.
    struct SlowProvider;

    impl TransportProvider for SlowProvider {
        fn create(&self, _server: &McpServer) -> Result<Arc<dyn Transport>, TransportError> {
            let (client_side, server_side) = InMemoryTransport::linked_pair();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                serve(Arc::new(ThinkingServer::new()), Arc::new(server_side)).await;
            });
            Ok(Arc::new(client_side))
        }
    }

    #[tokio::test]
    async fn test_close_during_connect_discards_client() {
        let manager = ConnectionManager::new(Arc::new(SlowProvider), ClientInfo::default());
        let server = McpServer::new_in_memory("t", "@aether/sequentialthinking");
        let key = server.connection_key();

        let (connected, closed) = tokio::join!(manager.ensure_connected(&server), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            manager.close(&key).await
        });

        assert!(!closed);
        assert!(matches!(connected, Err(McpClientError::Closed)));
        assert!(!manager.is_connected(&key));
        assert!(manager.connected_keys().is_empty());
    }

    #[test]
    fn test_id_prefix() {
        assert_eq!(id_prefix("@aether/memory"), "_aether_memory");
    }
}
