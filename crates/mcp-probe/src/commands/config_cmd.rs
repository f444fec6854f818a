//! `config` subcommand: show resolved configuration.
//!
//! Loads the full resolved configuration and prints it either as JSON
//! (`--json`) or as a human-readable key=value table.

use crate::cli::ConfigArgs;
use crate::config::{ProbeConfig, ResolvedConfig, resolve_config};
use std::path::PathBuf;

/// Run the `config` subcommand.
///
/// # Errors
///
/// Returns an error if config resolution fails (e.g., unreadable TOML file or
/// home directory cannot be determined).
pub async fn run(config_path: &Option<PathBuf>, args: ConfigArgs) -> anyhow::Result<()> {
    let resolved: ResolvedConfig = resolve_config(config_path.as_deref())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolved.probe)?);
    } else {
        print!("{}", render(&resolved));
    }

    Ok(())
}

fn render(resolved: &ResolvedConfig) -> String {
    let cfg: &ProbeConfig = &resolved.probe;
    let unset = |v: &str| if v.is_empty() { "<none>".to_string() } else { v.to_string() };

    let mut lines = vec![
        "mcp-probe configuration:".to_string(),
        format!("  server_bin         = {}", cfg.server_bin),
        format!("  server_args        = {:?}", cfg.server_args),
        format!("  quiet_flag         = {}", unset(&cfg.quiet_flag)),
        format!(
            "  server_cwd         = {}",
            cfg.server_cwd
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<inherit>".to_string())
        ),
        format!("  server_env         = {:?}", cfg.server_env),
        format!("  request_timeout_ms = {}", cfg.request_timeout_ms),
        format!("  shutdown_grace_ms  = {}", cfg.shutdown_grace_ms),
        format!("  client             = {} {}", cfg.client_name, cfg.client_version),
        format!("  protocol_version   = {}", cfg.protocol_version),
        format!("  keep_going         = {}", cfg.keep_going),
        format!("  echo_text          = {:?}", cfg.echo_text),
        format!("  list_files_path    = {}", cfg.list_files_path),
        "  steps:".to_string(),
        format!("    repeat_list      = {}", cfg.steps.repeat_list),
        format!("    system_info      = {}", cfg.steps.system_info),
        format!("    list_files       = {}", cfg.steps.list_files),
    ];

    if resolved.sources.is_empty() {
        lines.push("  sources            = (defaults only)".to_string());
    } else {
        lines.push("  sources:".to_string());
        for source in &resolved.sources {
            lines.push(format!("    {}", source.display()));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_sources_and_defaults() {
        let resolved = ResolvedConfig {
            probe: ProbeConfig {
                quiet_flag: String::new(),
                ..Default::default()
            },
            sources: vec![PathBuf::from("/repo/.mcp-probe.toml")],
        };
        let text = render(&resolved);
        assert!(text.contains("server_bin         = rust-mcp-server"));
        assert!(text.contains("quiet_flag         = <none>"));
        assert!(text.contains("/repo/.mcp-probe.toml"));
    }
}
