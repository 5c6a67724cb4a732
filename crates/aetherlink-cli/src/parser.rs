//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for managing and calling MCP tool servers.
///
/// Global options select the database and the platform the transports
/// behave as; subcommands do the work.
#[derive(Parser)]
#[command(name = "aetherlink")]
#[command(about = "Manage MCP servers and run tool calls from model output")]
#[command(version)]
pub struct Cli {
    /// SQLite database holding the server registry and settings
    #[arg(long = "db", global = true, env = "AETHERLINK_DB")]
    pub db: Option<PathBuf>,

    /// Behave as the web build (cross-origin rules apply)
    #[arg(long, global = true)]
    pub web: bool,

    /// Development build; with --web, routes requests through the CORS proxy
    #[arg(long, global = true)]
    pub dev: bool,

    /// Origin the CORS proxy is served from
    #[arg(long = "proxy-origin", global = true, env = "AETHERLINK_PROXY_ORIGIN")]
    pub proxy_origin: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
