//! Persisted list of MCP server records.
//!
//! The whole list lives under one key and every mutation writes it back in
//! full. The list is loaded on first use and cached; the cache is only
//! replaced after the store accepted the new list.

use std::sync::Arc;

use tokio::sync::Mutex;

use aetherlink_core::{KeyValueStore, McpRegistryError, McpServer, get_typed, set_typed};

/// Storage key holding the server list.
pub const SERVERS_STORAGE_KEY: &str = "mcp_servers";

pub struct ServerRegistry {
    store: Arc<dyn KeyValueStore>,
    servers: Mutex<Option<Vec<McpServer>>>,
}

impl ServerRegistry {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            servers: Mutex::new(None),
        }
    }

    async fn load(&self, cache: &mut Option<Vec<McpServer>>) -> Result<Vec<McpServer>, McpRegistryError> {
        if let Some(servers) = cache.as_ref() {
            return Ok(servers.clone());
        }
        let servers: Vec<McpServer> = get_typed(self.store.as_ref(), SERVERS_STORAGE_KEY)
            .await?
            .unwrap_or_default();
        tracing::debug!(count = servers.len(), "Loaded MCP server registry");
        *cache = Some(servers.clone());
        Ok(servers)
    }

    async fn persist(
        &self,
        cache: &mut Option<Vec<McpServer>>,
        servers: Vec<McpServer>,
    ) -> Result<(), McpRegistryError> {
        set_typed(self.store.as_ref(), SERVERS_STORAGE_KEY, &servers).await?;
        *cache = Some(servers);
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<McpServer>, McpRegistryError> {
        let mut cache = self.servers.lock().await;
        self.load(&mut cache).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<McpServer>, McpRegistryError> {
        Ok(self.list().await?.into_iter().find(|s| s.id == id))
    }

    /// Add a record. Ids must be unique.
    pub async fn add(&self, server: McpServer) -> Result<McpServer, McpRegistryError> {
        server.validate().map_err(McpRegistryError::InvalidConfig)?;

        let mut cache = self.servers.lock().await;
        let mut servers = self.load(&mut cache).await?;
        if servers.iter().any(|s| s.id == server.id) {
            return Err(McpRegistryError::Duplicate(server.id));
        }
        servers.push(server.clone());
        self.persist(&mut cache, servers).await?;

        tracing::debug!(server_id = %server.id, server_name = %server.name, "Registered MCP server");
        Ok(server)
    }

    /// Replace the record with the same id.
    ///
    /// Returns `false` without touching storage when no record has that id.
    pub async fn update(&self, server: McpServer) -> Result<bool, McpRegistryError> {
        server.validate().map_err(McpRegistryError::InvalidConfig)?;

        let mut cache = self.servers.lock().await;
        let mut servers = self.load(&mut cache).await?;
        let Some(slot) = servers.iter_mut().find(|s| s.id == server.id) else {
            tracing::warn!(server_id = %server.id, "Update for unknown MCP server ignored");
            return Ok(false);
        };
        *slot = server;
        self.persist(&mut cache, servers).await?;
        Ok(true)
    }

    /// Remove a record, returning it if it existed.
    pub async fn remove(&self, id: &str) -> Result<Option<McpServer>, McpRegistryError> {
        let mut cache = self.servers.lock().await;
        let mut servers = self.load(&mut cache).await?;
        let Some(index) = servers.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let removed = servers.remove(index);
        self.persist(&mut cache, servers).await?;
        Ok(Some(removed))
    }

    /// Set `isActive` on a record and persist it.
    pub async fn set_active(&self, id: &str, is_active: bool) -> Result<McpServer, McpRegistryError> {
        let mut cache = self.servers.lock().await;
        let mut servers = self.load(&mut cache).await?;
        let server = servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| McpRegistryError::NotFound(id.to_string()))?;
        server.is_active = is_active;
        let updated = server.clone();
        self.persist(&mut cache, servers).await?;
        Ok(updated)
    }

    pub async fn active(&self) -> Result<Vec<McpServer>, McpRegistryError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }
}
