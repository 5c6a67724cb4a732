//! `tools`, `prompts`, `resources` and `system-prompt`.

use anyhow::Result;

use aetherlink_mcp::mcp_system_prompt;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{first_line, print_separator, truncate_string};

pub async fn tools(ctx: &CliContext, server: Option<&str>) -> Result<()> {
    let tools = match server {
        Some(id) => ctx.mcp().list_tools(id).await,
        None => ctx.mcp().get_all_available_tools().await,
    }
    .map_err(CliError::from)?;

    if tools.is_empty() {
        println!("No tools available.");
        if server.is_none() {
            println!("Enable a server with 'aetherlink servers enable <id>'.");
        }
        return Ok(());
    }

    println!("{:<40} {:<24} Description", "Tool id", "Server");
    print_separator(100);
    for tool in tools {
        println!(
            "{:<40} {:<24} {}",
            truncate_string(&tool.id, 39),
            truncate_string(&tool.server_name, 23),
            first_line(tool.description.as_deref().unwrap_or_default()),
        );
    }
    Ok(())
}

pub async fn prompts(ctx: &CliContext, server: &str) -> Result<()> {
    let prompts = ctx.mcp().list_prompts(server).await.map_err(CliError::from)?;
    if prompts.is_empty() {
        println!("No prompts available.");
        return Ok(());
    }
    for prompt in prompts {
        let arguments = prompt
            .arguments
            .iter()
            .map(|a| if a.required { a.name.clone() } else { format!("[{}]", a.name) })
            .collect::<Vec<_>>()
            .join(" ");
        println!("{} {arguments}", prompt.name);
        if let Some(description) = &prompt.description {
            println!("    {}", first_line(description));
        }
    }
    Ok(())
}

pub async fn resources(ctx: &CliContext, server: &str) -> Result<()> {
    let resources = ctx.mcp().list_resources(server).await.map_err(CliError::from)?;
    if resources.is_empty() {
        println!("No resources available.");
        return Ok(());
    }
    for resource in resources {
        println!(
            "{}  {} ({})",
            resource.uri,
            resource.name,
            resource.mime_type.as_deref().unwrap_or("unknown type")
        );
    }
    Ok(())
}

pub async fn system_prompt(ctx: &CliContext) -> Result<()> {
    let tools = ctx
        .mcp()
        .get_all_available_tools()
        .await
        .map_err(CliError::from)?;
    print!("{}", mcp_system_prompt(&tools));
    Ok(())
}
