//! `SQLite` persistence for the AetherLink MCP client.
//!
//! Implements the `KeyValueStore` port on top of a single `settings_kv`
//! table. The MCP registry and client settings are stored as JSON documents.
#![deny(unsafe_code)]

pub mod repositories;
pub mod setup;

pub use repositories::SqliteKeyValueStore;

pub use setup::setup_database;
#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;

// Linked for the bundled SQLite build only.
use libsqlite3_sys as _;
