//! `SQLite` implementation of the `KeyValueStore` port.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use aetherlink_core::{KeyValueStore, StorageError};

/// Stores JSON documents in the `settings_kv` table.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure the key-value table exists.
    pub async fn ensure_table(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings_kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let row = sqlx::query("SELECT value FROM settings_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(r) => {
                let json: String = r.get("value");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let json = serde_json::to_string(&value)?;
        let updated_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        sqlx::query("INSERT OR REPLACE INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(&json)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        tracing::debug!(key, "Stored value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup_test_database;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_key_returns_none() {
        let store = SqliteKeyValueStore::new(setup_test_database().await.unwrap());
        assert!(store.get_item("mcp_servers").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = SqliteKeyValueStore::new(setup_test_database().await.unwrap());

        store.set_item("mcp_servers", json!([{"id": "a"}])).await.unwrap();
        store.set_item("mcp_servers", json!([])).await.unwrap();

        assert_eq!(store.get_item("mcp_servers").await.unwrap(), Some(json!([])));
    }

    #[tokio::test]
    async fn test_corrupt_value_is_serialization_error() {
        let pool = setup_test_database().await.unwrap();
        sqlx::query("INSERT INTO settings_kv (key, value, updated_at) VALUES ('k', '{oops', 'now')")
            .execute(&pool)
            .await
            .unwrap();

        let store = SqliteKeyValueStore::new(pool);
        assert!(matches!(
            store.get_item("k").await,
            Err(StorageError::Serialization(_))
        ));
    }
}
