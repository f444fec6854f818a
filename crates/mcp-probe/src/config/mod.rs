//! Configuration resolution for mcp-probe.
//!
//! The entry point is [`resolve_config`], which merges discovered TOML files
//! into a [`ProbeConfig`] and applies `MCP_PROBE_*` environment overrides.
//! CLI flags are applied afterwards by the command that owns them.
//!
//! See [`resolve`] for the full priority chain and [`types`] for all config types.

mod resolve;
mod types;

pub use resolve::{ResolvedConfig, resolve_config, resolve_config_from};
pub use types::{ProbeConfig, StepToggles};
