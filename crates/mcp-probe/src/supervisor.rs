//! Process supervisor for the server under test.
//!
//! [`ServerProcess`] owns exactly one child process: it launches the server
//! binary with piped stdin/stdout/stderr, exposes the pipes as a
//! [`LineTransport`], and tears the process down with escalation:
//!
//! 1. close stdin so a well-behaved server sees EOF and exits;
//! 2. on unix, send `SIGTERM` if it is still running after the grace period;
//! 3. force-kill after a second grace period.
//!
//! Standard error is drained by a background task. Every line is surfaced
//! through `tracing` (target `server.stderr`) and the most recent lines are
//! kept for failure diagnostics. Stderr is never parsed as protocol data.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::framing::{LineReader, write_newline_delimited};
use crate::transport::LineTransport;

/// Number of stderr lines retained for diagnostics.
pub const STDERR_TAIL_LINES: usize = 64;

/// Default flag passed to the server to suppress interactive output.
pub const DEFAULT_QUIET_FLAG: &str = "--quiet";

/// How long the stderr drain task may run after exit before it is aborted.
const STDERR_DRAIN_MS: u64 = 200;

/// Startup failures. Fatal: the run is aborted before any request is sent.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The binary is missing, not executable, or could not be spawned.
    #[error("failed to launch server `{program}`: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying spawn error
        #[source]
        source: io::Error,
    },

    /// One of the child's standard streams was not captured.
    #[error("server {0} stream could not be captured")]
    MissingStream(&'static str),
}

/// How to launch the server under test.
#[derive(Debug, Clone)]
pub struct ServerCommand {
    /// Path or name of the server binary
    pub program: String,
    /// Arguments passed before the quiet flag
    pub args: Vec<String>,
    /// Quiet/non-interactive flag appended after `args`, if any
    pub quiet_flag: Option<String>,
    /// Working directory for the child
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child
    pub env: Vec<(String, String)>,
    /// Grace period per shutdown escalation stage
    pub shutdown_grace: Duration,
}

impl ServerCommand {
    /// Command for `program` with the default quiet flag and a 2s grace period.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            quiet_flag: Some(DEFAULT_QUIET_FLAG.to_string()),
            cwd: None,
            env: Vec::new(),
            shutdown_grace: Duration::from_secs(2),
        }
    }

    /// Full argument vector, quiet flag last.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        if let Some(flag) = &self.quiet_flag {
            argv.push(flag.clone());
        }
        argv
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in self.argv() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A running (or stopped) server process and its pipes.
#[derive(Debug)]
pub struct ServerProcess {
    program: String,
    pid: Option<u32>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<LineReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    exit_status: Option<ExitStatus>,
    shutdown_grace: Duration,
}

impl ServerProcess {
    /// Launch the server and capture its three standard streams.
    pub fn start(command: &ServerCommand) -> Result<Self, StartupError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(command.argv())
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| StartupError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        // kill_on_drop reaps the child if any of these early returns fire
        let stdin = child.stdin.take().ok_or(StartupError::MissingStream("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(StartupError::MissingStream("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(StartupError::MissingStream("stderr"))?;

        let pid = child.id();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let tail = Arc::clone(&stderr_tail);
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::warn!(target: "server.stderr", pid = ?pid, "{line}");
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });

        tracing::info!(
            program = %command.program,
            pid = ?pid,
            args = ?command.argv(),
            "server process started"
        );

        Ok(Self {
            program: command.program.clone(),
            pid,
            child: Some(child),
            stdin: Some(stdin),
            stdout: Some(LineReader::new(stdout)),
            stderr_task: Some(stderr_task),
            stderr_tail,
            exit_status: None,
            shutdown_grace: command.shutdown_grace,
        })
    }

    /// OS process id, if the process was still running when it was spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Program this process was launched from.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Exit status, once the process has been observed to exit.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Most recent stderr lines, oldest first.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Shared handle to the stderr tail, usable after the process is moved.
    pub fn stderr_tail_handle(&self) -> Arc<Mutex<VecDeque<String>>> {
        Arc::clone(&self.stderr_tail)
    }

    async fn terminate(&mut self) -> io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(self.exit_status);
        };

        // EOF on stdin is the polite request to exit
        self.stdin.take();
        let outcome = escalate(&mut child, self.pid, self.shutdown_grace).await;

        // Streams are released whether or not the child could be reaped; a
        // child left unreaped here is killed when `child` drops.
        if let Ok(status) = &outcome {
            self.exit_status = Some(*status);
        }
        self.release_streams().await;

        match outcome {
            Ok(status) => {
                tracing::info!(
                    program = %self.program,
                    pid = ?self.pid,
                    %status,
                    "server process stopped"
                );
                Ok(Some(status))
            }
            Err(e) => {
                tracing::error!(program = %self.program, pid = ?self.pid, "server teardown failed: {e}");
                Err(e)
            }
        }
    }

    async fn release_streams(&mut self) {
        self.stdin.take();
        self.stdout.take();
        if let Some(task) = self.stderr_task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_millis(STDERR_DRAIN_MS), task)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
    }
}

/// Wait for `child` to exit, escalating to SIGTERM (unix) and then a kill,
/// each stage bounded by `grace`.
async fn escalate(child: &mut Child, pid: Option<u32>, grace: Duration) -> io::Result<ExitStatus> {
    if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
        return result;
    }

    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            tracing::warn!(pid, "server ignored stdin EOF, sending SIGTERM");
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if let Ok(result) = tokio::time::timeout(grace, child.wait()).await {
                return result;
            }
        }
    }

    tracing::warn!(?pid, "server did not exit in time, killing");
    child.kill().await?;
    child.wait().await
}

#[async_trait]
impl LineTransport for ServerProcess {
    fn is_alive(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::info!(pid = ?self.pid, %status, "server process has exited");
                self.exit_status = Some(status);
                false
            }
            Err(e) => {
                tracing::warn!(pid = ?self.pid, "failed to poll server process: {e}");
                false
            }
        }
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "server stdin is closed"))?;
        write_newline_delimited(stdin, text).await
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let stdout = self.stdout.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "server stdout is closed")
        })?;
        stdout.next_line().await
    }

    async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>> {
        self.terminate().await
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}
