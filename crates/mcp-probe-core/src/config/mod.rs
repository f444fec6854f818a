//! Configuration discovery
//!
//! Resolves raw configuration tables from multiple sources with priority:
//! 1. Explicit `--config` path (passed as a parameter)
//! 2. Repo-local config (`.mcp-probe.toml`, searched up to the git root)
//! 3. Global config (`~/.config/mcp-probe/config.toml`)
//!
//! Environment variables and CLI flags are applied on top of the merged table
//! by the consuming crate, which owns the typed config struct.

mod discovery;

pub use discovery::{
    ConfigError, LayeredTable, discover, find_repo_local_config, global_config_path, load_table,
    merge_tables, REPO_CONFIG_FILE,
};
