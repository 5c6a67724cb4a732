//! Main commands enum and subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage configured MCP servers
    Servers {
        #[command(subcommand)]
        command: ServersCommand,
    },

    /// Browse and add the built-in in-process servers
    Builtins {
        #[command(subcommand)]
        command: BuiltinsCommand,
    },

    /// List tools of one server, or of every active server
    Tools {
        /// Server id
        #[arg(long)]
        server: Option<String>,
    },

    /// List prompts of a server
    Prompts {
        /// Server id
        #[arg(long)]
        server: String,
    },

    /// List resources of a server
    Resources {
        /// Server id
        #[arg(long)]
        server: String,
    },

    /// Call one tool directly
    Call {
        /// Server id
        #[arg(long)]
        server: String,
        /// Tool name as the server reports it
        #[arg(long)]
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Extract tool calls from model output and run them
    Run {
        /// File with the model output; stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the tool-use system prompt for the active servers
    SystemPrompt,
}

#[derive(Subcommand)]
pub enum ServersCommand {
    /// List configured servers
    List,

    /// Add a network server
    Add(AddServerArgs),

    /// Remove a server and close its connection
    Remove {
        /// Server id
        id: String,
    },

    /// Activate a server and connect to it
    Enable {
        /// Server id
        id: String,
    },

    /// Deactivate a server and close its connection
    Disable {
        /// Server id
        id: String,
    },

    /// Check that a server connects and lists tools
    Test {
        /// Server id
        id: String,
    },
}

#[derive(Args)]
pub struct AddServerArgs {
    /// Display name; also prefixes tool ids
    #[arg(long)]
    pub name: String,

    /// Transport type: sse or streamableHttp
    #[arg(long = "type", default_value = "streamableHttp")]
    pub server_type: String,

    /// Server URL
    #[arg(long)]
    pub url: String,

    /// Record id; generated when omitted
    #[arg(long)]
    pub id: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Extra request header, KEY=VALUE (repeatable)
    #[arg(long = "header")]
    pub headers: Vec<String>,

    /// Per-call timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Activate and connect right away
    #[arg(long)]
    pub enable: bool,
}

#[derive(Subcommand)]
pub enum BuiltinsCommand {
    /// List the built-in servers
    List,

    /// Add a built-in server to the registry
    Add {
        /// Built-in name, e.g. @aether/memory
        name: String,
        /// Record id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Environment entry, KEY=VALUE (repeatable)
        #[arg(long = "env")]
        env: Vec<String>,
        /// Server argument (repeatable)
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Add without activating
        #[arg(long)]
        inactive: bool,
    },
}
