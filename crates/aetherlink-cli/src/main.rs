//! CLI entry point.
//!
//! Parses arguments, sets up logging on stderr, bootstraps the context and
//! dispatches to a handler. Errors map to sysexits-style exit codes.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use aetherlink_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads env-backed flags
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli);
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(config).await?;
    let outcome = match command {
        Commands::Servers { command } => handlers::servers::execute(&ctx, command).await,
        Commands::Builtins { command } => handlers::builtins::execute(&ctx, command).await,
        Commands::Tools { server } => handlers::discovery::tools(&ctx, server.as_deref()).await,
        Commands::Prompts { server } => handlers::discovery::prompts(&ctx, &server).await,
        Commands::Resources { server } => handlers::discovery::resources(&ctx, &server).await,
        Commands::Call { server, tool, args } => {
            handlers::call::execute(&ctx, &server, &tool, &args).await
        }
        Commands::Run { file } => handlers::run::execute(&ctx, file.as_deref()).await,
        Commands::SystemPrompt => handlers::discovery::system_prompt(&ctx).await,
    };

    ctx.mcp().cleanup().await;
    outcome
}
