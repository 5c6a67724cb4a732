//! Command-line adapter for the AetherLink MCP client.
//!
//! `bootstrap` is the composition root; `handlers` hold one module per
//! command group and only talk to `McpService`.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary only.
use dotenvy as _;
use tokio as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{AddServerArgs, BuiltinsCommand, Commands, ServersCommand};
pub use error::CliError;
pub use parser::Cli;
