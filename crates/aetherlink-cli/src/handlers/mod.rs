//! Command handlers that delegate to `McpService`.
//!
//! Handlers are thin: parse CLI-specific input, call the service, format
//! the result for the terminal. Signature: `pub async fn execute(ctx, ...)
//! -> Result<()>`.

pub mod builtins;
pub mod call;
pub mod discovery;
pub mod run;
pub mod servers;

use std::collections::HashMap;

use crate::error::CliError;

/// Parse repeated `KEY=VALUE` flags.
pub fn parse_key_values(pairs: &[String]) -> Result<HashMap<String, String>, CliError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .ok_or_else(|| CliError::Arguments(format!("expected KEY=VALUE, got '{pair}'")))
        })
        .collect()
}
