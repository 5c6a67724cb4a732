//! `servers` subcommands.

use anyhow::Result;

use aetherlink_core::McpServer;

use crate::bootstrap::CliContext;
use crate::commands::{AddServerArgs, ServersCommand};
use crate::error::CliError;
use crate::handlers::parse_key_values;
use crate::presentation::{print_separator, truncate_string};

pub async fn execute(ctx: &CliContext, command: ServersCommand) -> Result<()> {
    match command {
        ServersCommand::List => list(ctx).await,
        ServersCommand::Add(args) => add(ctx, args).await,
        ServersCommand::Remove { id } => {
            ctx.mcp().remove_server(&id).await.map_err(CliError::from)?;
            println!("Removed MCP server '{id}'");
            Ok(())
        }
        ServersCommand::Enable { id } => {
            let server = ctx
                .mcp()
                .toggle_server(&id, true)
                .await
                .map_err(CliError::from)?;
            println!("Enabled MCP server '{}' ({})", server.name, server.id);
            Ok(())
        }
        ServersCommand::Disable { id } => {
            let server = ctx
                .mcp()
                .toggle_server(&id, false)
                .await
                .map_err(CliError::from)?;
            println!("Disabled MCP server '{}' ({})", server.name, server.id);
            Ok(())
        }
        ServersCommand::Test { id } => {
            let server = ctx.mcp().get_server(&id).await.map_err(CliError::from)?;
            if ctx.mcp().test_connection(&server).await {
                println!("Connection to '{}' OK", server.name);
                Ok(())
            } else {
                Err(CliError::Mcp(format!("connection to '{}' failed", server.name)).into())
            }
        }
    }
}

async fn list(ctx: &CliContext) -> Result<()> {
    let servers = ctx.mcp().list_servers().await.map_err(CliError::from)?;
    if servers.is_empty() {
        println!("No MCP servers configured.");
        println!("Use 'aetherlink servers add' or 'aetherlink builtins add' to add one.");
        return Ok(());
    }

    println!(
        "{:<24} {:<28} {:<15} {:<7} URL",
        "ID", "Name", "Type", "Active"
    );
    print_separator(100);
    for server in servers {
        println!(
            "{:<24} {:<28} {:<15} {:<7} {}",
            truncate_string(&server.id, 23),
            truncate_string(&server.name, 27),
            server.server_type.as_str(),
            if server.is_active { "yes" } else { "no" },
            server.base_url.as_deref().unwrap_or("--"),
        );
    }
    Ok(())
}

async fn add(ctx: &CliContext, args: AddServerArgs) -> Result<()> {
    let server = record_from_args(args)?;
    let enable = server.is_active;
    let saved = ctx
        .mcp()
        .add_server(server.with_active(false))
        .await
        .map_err(CliError::from)?;
    println!("Added MCP server '{}' ({})", saved.name, saved.id);

    if enable {
        ctx.mcp()
            .toggle_server(&saved.id, true)
            .await
            .map_err(CliError::from)?;
        println!("Enabled MCP server '{}'", saved.name);
    }
    Ok(())
}

fn record_from_args(args: AddServerArgs) -> Result<McpServer, CliError> {
    let id = args.id.unwrap_or_else(|| default_id(&args.name));
    let mut server = match args.server_type.as_str() {
        "sse" => McpServer::new_sse(id, args.name, args.url),
        "streamableHttp" | "http" => McpServer::new_streamable_http(id, args.name, args.url),
        other => {
            return Err(CliError::Arguments(format!(
                "unsupported server type '{other}' (use sse or streamableHttp)"
            )));
        }
    };
    server.headers = parse_key_values(&args.headers)?;
    server.description = args.description;
    if let Some(timeout) = args.timeout {
        server.timeout_secs = timeout;
    }
    Ok(server.with_active(args.enable))
}

/// Lowercase name with runs of other characters collapsed to `-`.
fn default_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.ends_with('-') {
            id.push('-');
        }
    }
    let id = id.trim_matches('-');
    if id.is_empty() { "server".to_string() } else { id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aetherlink_core::McpServerType;

    fn args(server_type: &str) -> AddServerArgs {
        AddServerArgs {
            name: "Docs Search".to_string(),
            server_type: server_type.to_string(),
            url: "https://mcp.example.com/mcp".to_string(),
            id: None,
            description: None,
            headers: vec!["X-Key=abc".to_string()],
            timeout: Some(30),
            enable: false,
        }
    }

    #[test]
    fn test_record_from_args() {
        let server = record_from_args(args("sse")).unwrap();
        assert_eq!(server.id, "docs-search");
        assert_eq!(server.server_type, McpServerType::Sse);
        assert_eq!(server.headers["X-Key"], "abc");
        assert_eq!(server.timeout_secs, 30);
        assert!(!server.is_active);

        assert!(matches!(
            record_from_args(args("stdio")),
            Err(CliError::Arguments(_))
        ));
    }

    #[test]
    fn test_default_id() {
        assert_eq!(default_id("@Brave/Search!"), "brave-search");
        assert_eq!(default_id("!!!"), "server");
    }
}
