//! Home directory resolution for mcp-probe.
//!
//! # Precedence
//!
//! 1. `MCP_PROBE_HOME` environment variable (if set and non-empty)
//! 2. `dirs::home_dir()` platform default
//!
//! Tests that touch global config MUST set `MCP_PROBE_HOME` to a temp dir so
//! they never read the developer's real `~/.config/mcp-probe/config.toml`.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "MCP_PROBE_HOME";

/// Get the home directory used to locate global configuration.
///
/// # Errors
///
/// Returns an error if `MCP_PROBE_HOME` is unset and the platform home
/// directory cannot be determined.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    dirs::home_dir().context("Could not determine home directory")
}
