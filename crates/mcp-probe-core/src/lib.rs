//! Shared services for the mcp-probe harness.
//!
//! This crate holds the pieces every mcp-probe binary needs regardless of
//! what it drives:
//! - process-level logging setup ([`logging`])
//! - home directory resolution with a test override ([`home`])
//! - layered TOML config discovery ([`config`])

pub mod config;
pub mod home;
pub mod logging;
