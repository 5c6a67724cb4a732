//! `call` - invoke one tool and print its result.

use anyhow::Result;
use serde_json::Value;

use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, server: &str, tool: &str, args: &str) -> Result<()> {
    let arguments = parse_arguments(args)?;
    // Resolve first so an unknown id is reported as such, not as a failed call.
    ctx.mcp().get_server(server).await.map_err(CliError::from)?;

    let result = ctx.mcp().call_tool(server, tool, arguments).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.is_error {
        return Err(CliError::Mcp(format!("tool '{tool}' returned an error")).into());
    }
    Ok(())
}

fn parse_arguments(args: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(args)
        .map_err(|e| CliError::Arguments(format!("--args is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(CliError::Arguments("--args must be a JSON object".to_string()));
    }
    Ok(value)
}
