//! Config resolution for mcp-probe.
//!
//! Resolves [`ProbeConfig`] from multiple sources with the following priority
//! (highest to lowest):
//!
//! 1. CLI flags (applied by the caller after [`resolve_config`] returns)
//! 2. Environment variables (`MCP_PROBE_*`)
//! 3. Explicit `--config` file
//! 4. Repo-local `.mcp-probe.toml` (searched up to the git root)
//! 5. Global `~/.config/mcp-probe/config.toml`
//! 6. Compiled-in defaults (via [`ProbeConfig::default`])

use std::path::{Path, PathBuf};

use mcp_probe_core::config::{ConfigError, discover};
use mcp_probe_core::home::get_home_dir;

use super::types::ProbeConfig;

/// Resolved configuration plus the files it was read from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Effective harness configuration
    pub probe: ProbeConfig,
    /// Config files that contributed, lowest priority first
    pub sources: Vec<PathBuf>,
}

/// Resolve the complete configuration for mcp-probe.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined, if an
/// explicit `config_path` cannot be read, or if the merged table does not
/// match the [`ProbeConfig`] shape or fails [`ProbeConfig::validate`].
pub fn resolve_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let home_dir = get_home_dir()?;
    let current_dir = std::env::current_dir()?;
    resolve_config_from(config_path, &current_dir, &home_dir)
}

/// [`resolve_config`] with explicit search roots.
pub fn resolve_config_from(
    config_path: Option<&Path>,
    current_dir: &Path,
    home_dir: &Path,
) -> anyhow::Result<ResolvedConfig> {
    let layered = discover(config_path, current_dir, home_dir)?;

    let mut probe: ProbeConfig = toml::Value::Table(layered.table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid(e.message().to_string()))?;

    apply_env_overrides(&mut probe);
    probe.validate()?;
    tracing::debug!(sources = ?layered.sources, server = %probe.server_bin, "resolved config");

    Ok(ResolvedConfig {
        probe,
        sources: layered.sources,
    })
}

/// Apply `MCP_PROBE_*` environment variable overrides to `cfg`.
///
/// Empty or unparsable values are ignored.
fn apply_env_overrides(cfg: &mut ProbeConfig) {
    if let Ok(v) = std::env::var("MCP_PROBE_SERVER") {
        if !v.is_empty() {
            cfg.server_bin = v;
        }
    }
    if let Ok(v) = std::env::var("MCP_PROBE_TIMEOUT_MS") {
        if let Ok(ms) = v.parse::<u64>() {
            cfg.request_timeout_ms = ms;
        }
    }
    if let Ok(v) = std::env::var("MCP_PROBE_QUIET_FLAG") {
        cfg.quiet_flag = v;
    }
    if let Ok(v) = std::env::var("MCP_PROBE_KEEP_GOING") {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => cfg.keep_going = true,
            "0" | "false" | "no" => cfg.keep_going = false,
            _ => {}
        }
    }
}
