//! Key-value persistence port.
//!
//! Values are JSON documents. The typed helpers below handle conversion so
//! adapters only ever see `serde_json::Value`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use super::StorageError;

/// Two-method persistence interface for JSON documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the value stored under `key`.
    async fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Read and deserialize the value stored under `key`.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get_item(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize `value` and store it under `key`.
pub async fn set_typed<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.set_item(key, serde_json::to_value(value)?).await
}

/// In-process store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde::Deserialize;
    use serde_json::json;

    mock! {
        pub Store {}

        #[async_trait]
        impl KeyValueStore for Store {
            async fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError>;
            async fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError>;
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get_item("missing").await.unwrap().is_none());

        store.set_item("k", json!([1, 2])).await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MemoryKeyValueStore::new();
        let sample = Sample {
            name: "a".to_string(),
            count: 2,
        };
        set_typed(&store, "sample", &sample).await.unwrap();
        let loaded: Option<Sample> = get_typed(&store, "sample").await.unwrap();
        assert_eq!(loaded, Some(sample));
    }

    #[tokio::test]
    async fn test_typed_get_reports_shape_mismatch() {
        let mut store = MockStore::new();
        store
            .expect_get_item()
            .returning(|_| Ok(Some(json!("not an object"))));

        let result: Result<Option<Sample>, _> = get_typed(&store, "sample").await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let mut store = MockStore::new();
        store
            .expect_set_item()
            .returning(|_, _| Err(StorageError::Backend("disk full".to_string())));

        let result = set_typed(&store, "k", &1u32).await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
    }
}
