//! `builtins` subcommands.

use anyhow::Result;

use aetherlink_mcp::BuiltinOverrides;
use aetherlink_mcp::builtin::builtin_servers;

use crate::bootstrap::CliContext;
use crate::commands::BuiltinsCommand;
use crate::error::CliError;
use crate::handlers::parse_key_values;
use crate::presentation::first_line;

pub async fn execute(ctx: &CliContext, command: BuiltinsCommand) -> Result<()> {
    match command {
        BuiltinsCommand::List => {
            for server in builtin_servers() {
                println!("{}", server.name);
                if let Some(description) = &server.description {
                    println!("    {}", first_line(description));
                }
            }
            Ok(())
        }
        BuiltinsCommand::Add {
            name,
            id,
            description,
            env,
            args,
            inactive,
        } => {
            let overrides = BuiltinOverrides {
                id,
                description,
                env: parse_key_values(&env)?,
                args,
                is_active: Some(!inactive),
            };
            let server = ctx
                .mcp()
                .add_builtin_server(&name, overrides)
                .await
                .map_err(CliError::from)?;
            println!(
                "Added built-in server '{}' ({}){}",
                server.name,
                server.id,
                if server.is_active { ", active" } else { "" }
            );
            Ok(())
        }
    }
}
