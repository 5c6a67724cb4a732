//! CLI-specific error types and mappings.
//!
//! Maps service errors to exit codes and user-facing messages.

use aetherlink_core::{McpRegistryError, McpServiceError, StorageError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// MCP server unreachable or misbehaving.
    #[error("{0}")]
    Mcp(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// No such server.
    #[error("{0}")]
    NotFound(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl CliError {
    /// Map error to an exit code following sysexits.h.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Mcp(_) => 69,       // EX_UNAVAILABLE
            Self::Arguments(_) => 2,  // EX_USAGE
            Self::NotFound(_) => 66,  // EX_NOINPUT
            Self::Io(_) => 74,        // EX_IOERR
            Self::Config(_) => 78,    // EX_CONFIG
            Self::Database(_) => 73,  // EX_CANTCREAT
        }
    }
}

impl From<McpServiceError> for CliError {
    fn from(err: McpServiceError) -> Self {
        match err {
            McpServiceError::Registry(McpRegistryError::NotFound(id))
            | McpServiceError::NotFound(id) => Self::NotFound(format!("MCP server not found: {id}")),
            McpServiceError::Registry(McpRegistryError::Duplicate(id)) => {
                Self::Arguments(format!("MCP server already exists: {id}"))
            }
            McpServiceError::Registry(McpRegistryError::InvalidConfig(msg))
            | McpServiceError::InvalidConfig(msg) => Self::Config(msg),
            McpServiceError::Registry(McpRegistryError::Storage(e)) => Self::from(e),
            McpServiceError::Connection(msg) | McpServiceError::Internal(msg) => Self::Mcp(msg),
        }
    }
}

impl From<StorageError> for CliError {
    fn from(err: StorageError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_exit_codes() {
        let not_found: CliError = McpServiceError::NotFound("x".into()).into();
        assert_eq!(not_found.exit_code(), 66);

        let duplicate: CliError =
            McpServiceError::Registry(McpRegistryError::Duplicate("x".into())).into();
        assert_eq!(duplicate.exit_code(), 2);

        let storage: CliError = McpServiceError::Registry(McpRegistryError::Storage(
            StorageError::Backend("locked".into()),
        ))
        .into();
        assert_eq!(storage.exit_code(), 73);

        let connection: CliError = McpServiceError::Connection("refused".into()).into();
        assert_eq!(connection.exit_code(), 69);
        assert_eq!(connection.to_string(), "refused");
    }
}
