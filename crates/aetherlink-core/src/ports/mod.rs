//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - Storage is a two-method key-value interface; the registry owns the schema
//! - Event emission never blocks the caller

pub mod event_emitter;
pub mod key_value_store;
pub mod mcp_error;

use thiserror::Error;

pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use key_value_store::{KeyValueStore, MemoryKeyValueStore, get_typed, set_typed};
pub use mcp_error::{McpErrorCategory, McpErrorInfo, McpRegistryError, McpServiceError};

/// Errors raised by persistence adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist where one was required.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
