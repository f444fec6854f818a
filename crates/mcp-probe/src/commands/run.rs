//! `run` subcommand: launch the server and drive the standard sequence.
//!
//! Exit codes: `0` when every step passed, `1` when a step failed or was
//! skipped, `2` when the configuration could not be resolved or the server
//! could not be started.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::RunArgs;
use crate::config::{ProbeConfig, resolve_config};
use crate::protocol::McpClient;
use crate::report::RunReport;
use crate::rpc::RpcClient;
use crate::sequencer::{Sequencer, run_session};
use crate::steps::standard_steps;
use crate::supervisor::ServerProcess;

/// Exit code when a step failed or was skipped.
pub const EXIT_STEP_FAILURE: u8 = 1;
/// Exit code when the harness could not get a server running.
pub const EXIT_STARTUP_FAILURE: u8 = 2;

/// Run the `run` subcommand.
///
/// # Errors
///
/// Returns an error if config resolution fails or the report cannot be
/// serialized. Server and step failures are reported through the exit code.
pub async fn run(config_path: &Option<PathBuf>, args: RunArgs) -> anyhow::Result<ExitCode> {
    let mut cfg = resolve_config(config_path.as_deref())?.probe;
    apply_cli_overrides(&mut cfg, &args);
    cfg.validate()?;

    let mut sequencer = build_sequencer(&cfg);
    if !args.json {
        println!("mcp-probe: testing {}", cfg.server_command());
        sequencer = sequencer.with_observer(|step| {
            println!("{}", step.render());
            let _ = std::io::stdout().flush();
        });
    }

    let report = probe(&cfg, &mut sequencer).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render_summary());
    }

    Ok(exit_code(&report))
}

/// Apply `run` flags on top of the resolved configuration.
pub fn apply_cli_overrides(cfg: &mut ProbeConfig, args: &RunArgs) {
    if let Some(server) = &args.server {
        cfg.server_bin = server.clone();
    }
    if !args.args.is_empty() {
        cfg.server_args = args.args.clone();
    }
    if let Some(flag) = &args.quiet_flag {
        cfg.quiet_flag = flag.clone();
    }
    if args.no_quiet_flag {
        cfg.quiet_flag.clear();
    }
    if let Some(ms) = args.timeout_ms {
        cfg.request_timeout_ms = ms;
    }
    if args.keep_going {
        cfg.keep_going = true;
    }
    if let Some(text) = &args.echo_text {
        cfg.echo_text = text.clone();
    }
    if let Some(path) = &args.list_path {
        cfg.list_files_path = path.clone();
    }
}

/// Standard sequence for `cfg`, with its failure policy.
pub fn build_sequencer(cfg: &ProbeConfig) -> Sequencer {
    Sequencer::new(standard_steps(&cfg.step_plan())).with_policy(cfg.failure_policy())
}

/// Launch the configured server, run `sequencer` against it and tear it down.
///
/// A server that cannot be spawned yields a report with `startup_error` set
/// and no steps. The stderr tail is attached only when the run failed.
pub async fn probe(cfg: &ProbeConfig, sequencer: &mut Sequencer) -> RunReport {
    let command = cfg.server_command();
    let server = match ServerProcess::start(&command) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("server startup failed: {e}");
            return RunReport::startup_failed(&command.program, e.to_string());
        }
    };
    tracing::info!(pid = ?server.pid(), program = %command.program, "server started");

    let tail = server.stderr_tail_handle();
    let rpc = RpcClient::new(Box::new(server)).with_deadline(cfg.request_timeout());
    let client = McpClient::new(rpc)
        .with_client_info(cfg.client_info())
        .with_protocol_version(cfg.protocol_version.clone());

    let mut report = run_session(client, sequencer).await;
    report.server = command.program.clone();
    if !report.passed() {
        report.server_stderr = tail
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default();
    }
    report
}

/// Process exit code for a finished report.
pub fn exit_code(report: &RunReport) -> ExitCode {
    if report.startup_error.is_some() {
        ExitCode::from(EXIT_STARTUP_FAILURE)
    } else if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_STEP_FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{StepOutcome, StepReport};
    use crate::sequencer::FailurePolicy;

    #[test]
    fn cli_flags_override_config() {
        let mut cfg = ProbeConfig::default();
        let args = RunArgs {
            server: Some("./srv".to_string()),
            args: vec!["--stdio".to_string()],
            no_quiet_flag: true,
            timeout_ms: Some(42),
            keep_going: true,
            echo_text: Some("hi".to_string()),
            list_path: Some("/tmp".to_string()),
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &args);

        assert_eq!(cfg.server_command().argv(), vec!["--stdio"]);
        assert_eq!(cfg.server_bin, "./srv");
        assert_eq!(cfg.request_timeout_ms, 42);
        assert_eq!(cfg.failure_policy(), FailurePolicy::ContinueOnFailure);
        assert_eq!(cfg.echo_text, "hi");
        assert_eq!(cfg.list_files_path, "/tmp");
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut cfg = ProbeConfig {
            server_args: vec!["a".to_string()],
            keep_going: true,
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &RunArgs::default());
        assert_eq!(cfg.server_args, vec!["a"]);
        assert!(cfg.keep_going);
        assert_eq!(cfg.quiet_flag, "--quiet");
    }

    #[test]
    fn sequencer_follows_step_toggles() {
        let mut cfg = ProbeConfig::default();
        let full = build_sequencer(&cfg).step_names().len();
        cfg.steps.list_files = false;
        cfg.steps.repeat_list = false;
        assert_eq!(build_sequencer(&cfg).step_names().len(), full - 2);
    }

    #[tokio::test]
    async fn missing_binary_is_a_startup_failure() {
        let cfg = ProbeConfig {
            server_bin: "/nonexistent/mcp-probe-missing-server".to_string(),
            ..Default::default()
        };
        let mut sequencer = build_sequencer(&cfg);
        let report = probe(&cfg, &mut sequencer).await;
        assert!(report.startup_error.is_some());
        assert!(report.steps.is_empty());
        assert_eq!(exit_code(&report), ExitCode::from(EXIT_STARTUP_FAILURE));
    }

    #[test]
    fn exit_codes() {
        let mut report = RunReport {
            server: "srv".to_string(),
            steps: vec![StepReport {
                name: "ping".to_string(),
                outcome: StepOutcome::passed(vec![]),
                elapsed_ms: 0,
            }],
            ..Default::default()
        };
        assert_eq!(exit_code(&report), ExitCode::SUCCESS);
        report.skipped.push("echo".to_string());
        assert_eq!(exit_code(&report), ExitCode::from(EXIT_STEP_FAILURE));
    }
}
