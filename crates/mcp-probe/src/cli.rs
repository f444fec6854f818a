//! CLI argument types for mcp-probe.
//!
//! Defines the top-level [`Cli`] struct and all subcommand [`Args`] using
//! clap's derive macros. Each subcommand maps to a module in [`crate::commands`].

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// End-to-end smoke tester for MCP servers speaking JSON-RPC over stdio
#[derive(Parser, Debug)]
#[command(name = "mcp-probe", version, about)]
pub struct Cli {
    /// Path to a config file (default: .mcp-probe.toml, auto-detected)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch a server and run the standard test sequence against it
    Run(RunArgs),
    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Server binary to launch (overrides config/env)
    #[arg(long)]
    pub server: Option<String>,

    /// Argument passed to the server; repeatable
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Quiet flag appended to the server command line
    #[arg(long, conflicts_with = "no_quiet_flag", allow_hyphen_values = true)]
    pub quiet_flag: Option<String>,

    /// Do not append any quiet flag
    #[arg(long)]
    pub no_quiet_flag: bool,

    /// Per-request response deadline in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: Option<u64>,

    /// Keep running steps after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Print the run report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Text sent to the echo tool
    #[arg(long)]
    pub echo_text: Option<String>,

    /// Directory passed to the list_files tool
    #[arg(long)]
    pub list_path: Option<String>,
}

/// Arguments for the `config` subcommand
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
