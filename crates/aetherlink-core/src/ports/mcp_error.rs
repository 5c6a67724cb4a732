//! MCP registry and service error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::StorageError;

/// Errors from the server registry.
#[derive(Debug, Error)]
pub enum McpRegistryError {
    /// No server with the given id.
    #[error("MCP server not found: {0}")]
    NotFound(String),

    /// A server with the same id already exists.
    #[error("MCP server already exists: {0}")]
    Duplicate(String),

    /// Required fields missing or inconsistent.
    #[error("Invalid MCP server config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Domain-specific errors for MCP service operations.
///
/// Wraps registry errors and adds service-level failure modes without leaking
/// transport details (HTTP status lines, socket errors, etc.).
#[derive(Debug, Error)]
pub enum McpServiceError {
    #[error(transparent)]
    Registry(#[from] McpRegistryError),

    /// Connecting to the server failed.
    #[error("Failed to connect to MCP server: {0}")]
    Connection(String),

    /// Configuration rejected at transport construction.
    #[error("Invalid MCP configuration: {0}")]
    InvalidConfig(String),

    /// No server with the given id.
    #[error("MCP server not found: {0}")]
    NotFound(String),

    /// Internal service error.
    #[error("Internal MCP error: {0}")]
    Internal(String),
}

/// User-safe error information for MCP events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,

    pub server_name: String,

    /// User-friendly error message.
    pub message: String,

    pub category: McpErrorCategory,
}

/// Categories of MCP errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpErrorCategory {
    /// Connection or handshake failure.
    Connection,
    /// Protocol communication error.
    Protocol,
    /// Tool invocation error.
    Tool,
    /// Configuration error.
    Configuration,
    /// Unknown/internal error.
    Unknown,
}

impl McpErrorInfo {
    /// Build error info from a service error.
    pub fn from_error(
        server_id: Option<String>,
        server_name: impl Into<String>,
        error: &McpServiceError,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: error.to_string(),
            category: error.into(),
        }
    }

    /// Create error info for a tool error.
    pub fn tool(
        server_id: Option<String>,
        server_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            server_id,
            server_name: server_name.into(),
            message: message.into(),
            category: McpErrorCategory::Tool,
        }
    }
}

impl From<&McpServiceError> for McpErrorCategory {
    fn from(error: &McpServiceError) -> Self {
        match error {
            McpServiceError::Registry(McpRegistryError::InvalidConfig(_))
            | McpServiceError::InvalidConfig(_) => Self::Configuration,
            McpServiceError::Connection(_) => Self::Connection,
            McpServiceError::Registry(_)
            | McpServiceError::NotFound(_)
            | McpServiceError::Internal(_) => Self::Unknown,
        }
    }
}
