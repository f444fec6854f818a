//! Shared logging initialization for mcp-probe binaries.
//!
//! Log output goes to stderr. Stdout is reserved for the run report so that
//! `--json` output stays machine-readable.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Environment variable consulted for the log level.
pub const LOG_ENV: &str = "MCP_PROBE_LOG";

fn parse_level(raw: Option<&str>) -> tracing::Level {
    match raw
        .unwrap_or("warn")
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    }
}

/// Initialize process-level tracing output from `MCP_PROBE_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It is best-effort and never returns an error.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_warn() {
        assert_eq!(parse_level(None), tracing::Level::WARN);
        assert_eq!(parse_level(Some("bogus")), tracing::Level::WARN);
    }

    #[test]
    fn level_is_case_insensitive() {
        assert_eq!(parse_level(Some("DEBUG")), tracing::Level::DEBUG);
        assert_eq!(parse_level(Some(" trace ")), tracing::Level::TRACE);
        assert_eq!(parse_level(Some("Info")), tracing::Level::INFO);
        assert_eq!(parse_level(Some("error")), tracing::Level::ERROR);
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
