//! Core domain types and ports for the AetherLink MCP client layer.
//!
//! This crate has no transport or storage implementations. It defines:
//!
//! - `domain` - MCP server records, tools, prompts, resources and call results
//! - `ports` - the key-value persistence and event emitter abstractions
//! - `events` - application events emitted by the MCP service
//! - `settings` - client settings shared by the transport factory and adapters
//! - `paths` - data directory resolution for adapters
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use domain::{
    CallToolResult, ConnectionKey, ContentKind, EmbeddedResource, McpPrompt, McpPromptArgument,
    McpResource, McpServer, McpServerType, McpTool, ToolCallRequest, ToolCallStatus, ToolContent,
};
pub use events::{AppEvent, McpServerSummary};
pub use ports::{
    AppEventEmitter, KeyValueStore, McpErrorCategory, McpErrorInfo, McpRegistryError,
    McpServiceError, MemoryKeyValueStore, NoopEmitter, StorageError, get_typed, set_typed,
};
pub use settings::{McpSettings, Platform, SETTINGS_STORAGE_KEY, SettingsError};
