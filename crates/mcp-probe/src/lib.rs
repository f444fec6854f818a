//! mcp-probe library crate.
//!
//! Launches an MCP server as a child process, talks JSON-RPC 2.0 to it over
//! newline-delimited stdio, and runs a fixed sequence of protocol checks.
//!
//! Layers, bottom-up:
//!
//! - [`framing`] / [`transport`]: line framing and the [`transport::LineTransport`] seam
//! - [`supervisor`]: the child process and its escalating teardown
//! - [`rpc`]: request/response correlation with per-call deadlines
//! - [`protocol`]: typed MCP method wrappers
//! - [`sequencer`] / [`steps`] / [`report`]: the test sequence and its results
//!
//! The binary front-end lives in [`cli`] and [`commands`].

pub mod cli;
pub mod commands;
pub mod config;
pub mod framing;
pub mod protocol;
pub mod report;
pub mod rpc;
pub mod sequencer;
pub mod steps;
pub mod supervisor;
pub mod transport;

pub use protocol::McpClient;
pub use report::{RunReport, StepOutcome, StepReport};
pub use rpc::{Response, RpcClient, RpcError, TransportError};
pub use sequencer::{FailurePolicy, Sequencer, Step, run_session};
pub use supervisor::{ServerCommand, ServerProcess, StartupError};
pub use transport::{LineTransport, MockTransport, MockTransportHandle};
