//! Configuration types for mcp-probe.
//!
//! [`ProbeConfig`] is deserialized from the merged `.mcp-probe.toml` /
//! `~/.config/mcp-probe/config.toml` tables. Every field has a default so a
//! missing or partial file still yields a runnable configuration.
//!
//! # Example `.mcp-probe.toml`
//!
//! ```toml
//! server_bin = "./target/release/rust-mcp-server"
//! server_args = ["--name", "under-test"]
//! request_timeout_ms = 5000
//! keep_going = true
//!
//! [server_env]
//! RUST_LOG = "info"
//!
//! [steps]
//! list_files = false
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use mcp_probe_core::config::ConfigError;
use serde::{Deserialize, Serialize};

use crate::protocol::{Implementation, PROTOCOL_VERSION};
use crate::sequencer::FailurePolicy;
use crate::steps::StepPlan;
use crate::supervisor::{DEFAULT_QUIET_FLAG, ServerCommand};

/// Toggles for the optional steps of the standard sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepToggles {
    /// List tools twice and compare
    #[serde(default = "default_true")]
    pub repeat_list: bool,
    /// Call `get_system_info`
    #[serde(default = "default_true")]
    pub system_info: bool,
    /// Call `list_files`
    #[serde(default = "default_true")]
    pub list_files: bool,
}

impl Default for StepToggles {
    fn default() -> Self {
        Self {
            repeat_list: true,
            system_info: true,
            list_files: true,
        }
    }
}

/// Resolved harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Server binary to launch (default: `"rust-mcp-server"` from `PATH`)
    #[serde(default = "default_server_bin")]
    pub server_bin: String,

    /// Arguments passed to the server before the quiet flag
    #[serde(default)]
    pub server_args: Vec<String>,

    /// Quiet/non-interactive flag; empty string disables it (default: `"--quiet"`)
    #[serde(default = "default_quiet_flag")]
    pub quiet_flag: String,

    /// Working directory for the server
    #[serde(default)]
    pub server_cwd: Option<PathBuf>,

    /// Extra environment variables for the server
    #[serde(default)]
    pub server_env: BTreeMap<String, String>,

    /// Per-request response deadline in milliseconds (default: `10000`)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Grace period per shutdown stage in milliseconds (default: `2000`)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Client name sent in `initialize`
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Client version sent in `initialize`
    #[serde(default = "default_client_version")]
    pub client_version: String,

    /// Protocol version sent in `initialize` and required back
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,

    /// Keep running steps after a failure (default: `false`)
    #[serde(default)]
    pub keep_going: bool,

    /// Text sent to the echo tool
    #[serde(default = "default_echo_text")]
    pub echo_text: String,

    /// Directory passed to `list_files`
    #[serde(default = "default_list_files_path")]
    pub list_files_path: String,

    /// Optional step toggles
    #[serde(default)]
    pub steps: StepToggles,
}

fn default_true() -> bool {
    true
}

fn default_server_bin() -> String {
    "rust-mcp-server".to_string()
}

fn default_quiet_flag() -> String {
    DEFAULT_QUIET_FLAG.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_grace_ms() -> u64 {
    2_000
}

fn default_client_name() -> String {
    Implementation::default().name
}

fn default_client_version() -> String {
    Implementation::default().version
}

fn default_protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_echo_text() -> String {
    StepPlan::default().echo_text
}

fn default_list_files_path() -> String {
    StepPlan::default().list_files_path
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            server_bin: default_server_bin(),
            server_args: Vec::new(),
            quiet_flag: default_quiet_flag(),
            server_cwd: None,
            server_env: BTreeMap::new(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            client_name: default_client_name(),
            client_version: default_client_version(),
            protocol_version: default_protocol_version(),
            keep_going: false,
            echo_text: default_echo_text(),
            list_files_path: default_list_files_path(),
            steps: StepToggles::default(),
        }
    }
}

impl ProbeConfig {
    /// Reject values that would make every run fail for reasons unrelated to
    /// the server.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty `server_bin` or a zero
    /// `request_timeout_ms`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_bin.trim().is_empty() {
            return Err(ConfigError::Invalid("server_bin must not be empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// How to launch the server.
    pub fn server_command(&self) -> ServerCommand {
        ServerCommand {
            args: self.server_args.clone(),
            quiet_flag: Some(self.quiet_flag.clone()).filter(|f| !f.is_empty()),
            cwd: self.server_cwd.clone(),
            env: self
                .server_env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
            ..ServerCommand::new(self.server_bin.clone())
        }
    }

    /// Per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Identity sent in `initialize`.
    pub fn client_info(&self) -> Implementation {
        Implementation {
            name: self.client_name.clone(),
            version: self.client_version.clone(),
        }
    }

    /// Failure policy derived from `keep_going`.
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.keep_going {
            FailurePolicy::ContinueOnFailure
        } else {
            FailurePolicy::StopOnFirstFailure
        }
    }

    /// Inputs for the standard step sequence.
    pub fn step_plan(&self) -> StepPlan {
        StepPlan {
            protocol_version: self.protocol_version.clone(),
            echo_text: self.echo_text.clone(),
            list_files_path: self.list_files_path.clone(),
            repeat_list: self.steps.repeat_list,
            system_info: self.steps.system_info,
            list_files: self.steps.list_files,
        }
    }
}
