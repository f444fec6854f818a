//! MCP method facade over [`RpcClient`].
//!
//! [`McpClient`] is the session: one server transport plus one id counter.
//! Its five methods only fix request shapes. They return the raw
//! [`Response`] and add no failure handling of their own. The typed views in
//! this module ([`InitializeResult`], [`ListToolsResult`], ...) are used by
//! callers that want to decode a successful result.

use std::io;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::rpc::{Response, RpcClient};

/// Protocol version literal sent in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP method names used by the harness.
pub mod methods {
    /// Handshake request
    pub const INITIALIZE: &str = "initialize";
    /// Handshake acknowledgement
    pub const INITIALIZED: &str = "initialized";
    /// Tool listing
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation
    pub const TOOLS_CALL: &str = "tools/call";
    /// Liveness check
    pub const PING: &str = "ping";
}

/// Name/version pair identifying a client or server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name
    pub name: String,
    /// Implementation version
    pub version: String,
}

impl Default for Implementation {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Result of `initialize`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol version the server speaks
    pub protocol_version: String,
    /// Server identity
    pub server_info: Implementation,
    /// Advertised capabilities, verbatim
    #[serde(default)]
    pub capabilities: Value,
}

/// One tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Tool name used in `tools/call`
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

/// Result of `tools/list`. Order is as returned by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListToolsResult {
    /// Advertised tools
    pub tools: Vec<ToolDescriptor>,
}

/// One content item of a tool result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    /// `{"type": "text", "text": ...}`
    Text(String),
    /// Any other content type, kept verbatim
    Other {
        /// The `type` tag, if present
        kind: Option<String>,
        /// The whole item
        raw: Value,
    },
}

impl ToolContent {
    /// The content `type` tag.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Text(_) => Some("text"),
            Self::Other { kind, .. } => kind.as_deref(),
        }
    }

    /// The text payload of a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Other { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for ToolContent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let kind = raw.get("type").and_then(Value::as_str).map(str::to_string);
        match (kind.as_deref(), raw.get("text").and_then(Value::as_str)) {
            (Some("text"), Some(text)) => Ok(Self::Text(text.to_string())),
            _ => Ok(Self::Other { kind, raw }),
        }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content items, in order
    #[serde(default)]
    pub content: Vec<ToolContent>,
    /// Tool-level failure flag
    #[serde(default)]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Text of the first content item, if it is a text item.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(ToolContent::as_text)
    }
}

/// Result of `ping`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PingResult {
    /// Pong marker; servers that answer `{}` leave it unset
    #[serde(default)]
    pub pong: Option<bool>,
}

/// The harness session: one server plus one id counter.
#[derive(Debug)]
pub struct McpClient {
    rpc: RpcClient,
    client_info: Implementation,
    protocol_version: String,
}

impl McpClient {
    /// Wrap an [`RpcClient`] with the default identity and protocol version.
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            rpc,
            client_info: Implementation::default(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Override the identity sent in `initialize`.
    pub fn with_client_info(mut self, client_info: Implementation) -> Self {
        self.client_info = client_info;
        self
    }

    /// Override the protocol version sent in `initialize`.
    pub fn with_protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Identity sent in `initialize`.
    pub fn client_info(&self) -> &Implementation {
        &self.client_info
    }

    /// Protocol version sent in `initialize`.
    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Direct access to the JSON-RPC layer.
    pub fn rpc(&mut self) -> &mut RpcClient {
        &mut self.rpc
    }

    /// `initialize` with protocol version, empty capabilities and client identity.
    pub async fn initialize(&mut self) -> Response {
        let params = json!({
            "protocolVersion": self.protocol_version,
            "capabilities": {},
            "clientInfo": self.client_info,
        });
        self.rpc.call(methods::INITIALIZE, Some(params)).await
    }

    /// `initialized`, acknowledging the handshake. No params.
    pub async fn confirm_initialization(&mut self) -> Response {
        self.rpc.call(methods::INITIALIZED, None).await
    }

    /// `tools/list`. No params.
    pub async fn list_tools(&mut self) -> Response {
        self.rpc.call(methods::TOOLS_LIST, None).await
    }

    /// `tools/call` with `{name, arguments}`.
    pub async fn call_tool(&mut self, name: &str, arguments: Map<String, Value>) -> Response {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });
        self.rpc.call(methods::TOOLS_CALL, Some(params)).await
    }

    /// `ping`. No params.
    pub async fn ping(&mut self) -> Response {
        self.rpc.call(methods::PING, None).await
    }

    /// Stop the server. Idempotent.
    pub async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>> {
        self.rpc.shutdown().await
    }
}

/// Build a `tools/call` argument map from a JSON object literal.
///
/// Non-object values yield an empty map.
pub fn arguments(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
