//! mcp-probe: end-to-end smoke tester for stdio MCP servers.
//!
//! # Subcommands
//!
//! - `run`    : launch a server and run the standard test sequence
//! - `config` : show resolved configuration

use std::process::ExitCode;

use clap::Parser;
use mcp_probe_core::logging;

use mcp_probe::cli::{Cli, Commands};
use mcp_probe::commands;
use mcp_probe::commands::run::EXIT_STARTUP_FAILURE;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => commands::run::run(&cli.config, args).await,
        Commands::Config(args) => commands::config_cmd::run(&cli.config, args)
            .await
            .map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("mcp-probe: {e:#}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}
