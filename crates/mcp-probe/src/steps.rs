//! The standard smoke-test sequence.
//!
//! Run order: `initialize`, `initialized`, `tools/list`, an optional repeat
//! listing to check it is stable, the `echo` round trip, the optional
//! `get_system_info` and `list_files` tool calls, and `ping`.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::protocol::{
    CallToolResult, InitializeResult, ListToolsResult, McpClient, PROTOCOL_VERSION, PingResult,
    ToolDescriptor, arguments,
};
use crate::report::StepOutcome;
use crate::rpc::Response;
use crate::sequencer::Step;

/// Which steps to build and with what inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    /// Protocol version the server must report
    pub protocol_version: String,
    /// Text sent to the echo tool
    pub echo_text: String,
    /// Directory passed to `list_files`
    pub list_files_path: String,
    /// List tools twice and require identical listings
    pub repeat_list: bool,
    /// Call `get_system_info`
    pub system_info: bool,
    /// Call `list_files`
    pub list_files: bool,
}

impl Default for StepPlan {
    fn default() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            echo_text: "Hello from mcp-probe!".to_string(),
            list_files_path: ".".to_string(),
            repeat_list: true,
            system_info: true,
            list_files: true,
        }
    }
}

/// Build the standard sequence for `plan`.
pub fn standard_steps(plan: &StepPlan) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = vec![
        Box::new(InitializeStep {
            expected_version: plan.protocol_version.clone(),
        }),
        Box::new(ConfirmInitializationStep),
        Box::new(ListToolsStep),
    ];
    if plan.repeat_list {
        steps.push(Box::new(StableToolListStep));
    }
    steps.push(Box::new(CallToolStep::echo(&plan.echo_text)));
    if plan.system_info {
        steps.push(Box::new(CallToolStep::new(
            "get_system_info",
            "get_system_info",
            Map::new(),
            ToolCheck::AnyText,
        )));
    }
    if plan.list_files {
        steps.push(Box::new(CallToolStep::new(
            "list_files",
            "list_files",
            arguments(json!({"path": plan.list_files_path})),
            ToolCheck::AnyText,
        )));
    }
    steps.push(Box::new(PingStep));
    steps
}

/// Decode a success or turn the response into a failed outcome.
fn expect_success<T: serde::de::DeserializeOwned>(response: &Response) -> Result<T, StepOutcome> {
    if response.is_error() {
        return Err(StepOutcome::from_error_response(response));
    }
    response.decode().map_err(|e| StepOutcome::Failed {
        reason: e.to_string(),
        details: vec![format!("response: {}", response.to_envelope())],
    })
}

/// `initialize`: handshake and protocol version check.
#[derive(Debug)]
pub struct InitializeStep {
    /// Version the server must report
    pub expected_version: String,
}

#[async_trait]
impl Step for InitializeStep {
    fn name(&self) -> &str {
        "initialize"
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let response = client.initialize().await;
        let init: InitializeResult = match expect_success(&response) {
            Ok(init) => init,
            Err(outcome) => return Ok(outcome),
        };

        let details = vec![
            format!("protocolVersion: {}", init.protocol_version),
            format!("server: {} v{}", init.server_info.name, init.server_info.version),
        ];
        if init.protocol_version != self.expected_version {
            return Ok(StepOutcome::Failed {
                reason: format!(
                    "server reported protocol {}, expected {}",
                    init.protocol_version, self.expected_version
                ),
                details,
            });
        }
        Ok(StepOutcome::passed(details))
    }
}

/// `initialized`: acknowledge the handshake.
#[derive(Debug)]
pub struct ConfirmInitializationStep;

#[async_trait]
impl Step for ConfirmInitializationStep {
    fn name(&self) -> &str {
        "initialized"
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let response = client.confirm_initialization().await;
        if response.is_error() {
            return Ok(StepOutcome::from_error_response(&response));
        }
        Ok(StepOutcome::passed(vec![]))
    }
}

/// `tools/list`: the server must advertise at least one tool.
#[derive(Debug)]
pub struct ListToolsStep;

#[async_trait]
impl Step for ListToolsStep {
    fn name(&self) -> &str {
        "tools/list"
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let response = client.list_tools().await;
        let list: ListToolsResult = match expect_success(&response) {
            Ok(list) => list,
            Err(outcome) => return Ok(outcome),
        };
        if list.tools.is_empty() {
            return Ok(StepOutcome::failed("server advertised no tools"));
        }

        let mut details = vec![format!("found {} tools", list.tools.len())];
        details.extend(
            list.tools
                .iter()
                .map(|t| format!("- {}: {}", t.name, t.description)),
        );
        Ok(StepOutcome::passed(details))
    }
}

/// Lists tools twice; both listings must be identical, in order.
#[derive(Debug)]
pub struct StableToolListStep;

#[async_trait]
impl Step for StableToolListStep {
    fn name(&self) -> &str {
        "tools/list (repeat)"
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let mut listings = Vec::with_capacity(2);
        for _ in 0..2 {
            let response = client.list_tools().await;
            match expect_success::<ListToolsResult>(&response) {
                Ok(list) => listings.push(list.tools),
                Err(outcome) => return Ok(outcome),
            }
        }
        if listings[0] != listings[1] {
            let names = |tools: &[ToolDescriptor]| {
                tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
            };
            return Ok(StepOutcome::Failed {
                reason: "tool listing changed between calls".to_string(),
                details: vec![
                    format!("first:  {}", names(&listings[0])),
                    format!("second: {}", names(&listings[1])),
                ],
            });
        }
        Ok(StepOutcome::passed(vec![format!(
            "{} tools, identical across calls",
            listings[0].len()
        )]))
    }
}

/// How to judge a tool's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCheck {
    /// The first item is text containing this string
    Contains(String),
    /// The first item is text
    AnyText,
}

/// `tools/call` of one tool with fixed arguments.
#[derive(Debug)]
pub struct CallToolStep {
    name: String,
    tool: String,
    arguments: Map<String, Value>,
    check: ToolCheck,
}

impl CallToolStep {
    /// Call `tool` with `arguments` and judge the result by `check`.
    pub fn new(
        name: impl Into<String>,
        tool: impl Into<String>,
        arguments: Map<String, Value>,
        check: ToolCheck,
    ) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            arguments,
            check,
        }
    }

    /// Echo round trip: the text sent must come back.
    pub fn echo(text: &str) -> Self {
        Self::new(
            "echo",
            "echo",
            arguments(json!({"text": text})),
            ToolCheck::Contains(text.to_string()),
        )
    }
}

#[async_trait]
impl Step for CallToolStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let response = client.call_tool(&self.tool, self.arguments.clone()).await;
        let result: CallToolResult = match expect_success(&response) {
            Ok(result) => result,
            Err(outcome) => return Ok(outcome),
        };

        let Some(first) = result.content.first() else {
            return Ok(StepOutcome::failed(format!("{} returned no content", self.tool)));
        };
        let Some(text) = first.as_text() else {
            return Ok(StepOutcome::failed(format!(
                "first content item is of type {}, expected text",
                first.kind().unwrap_or("<none>")
            )));
        };
        let first_line = text.lines().next().unwrap_or_default().to_string();

        if result.is_error == Some(true) {
            return Ok(StepOutcome::Failed {
                reason: format!("{} reported a tool error", self.tool),
                details: vec![first_line],
            });
        }
        if let ToolCheck::Contains(expected) = &self.check {
            if !text.contains(expected.as_str()) {
                return Ok(StepOutcome::Failed {
                    reason: format!("expected text containing {expected:?}"),
                    details: vec![format!("got: {text:?}")],
                });
            }
        }
        Ok(StepOutcome::passed(vec![first_line]))
    }
}

/// `ping`: the server must answer `{"pong": true}`.
#[derive(Debug)]
pub struct PingStep;

#[async_trait]
impl Step for PingStep {
    fn name(&self) -> &str {
        "ping"
    }

    async fn run(&self, client: &mut McpClient) -> anyhow::Result<StepOutcome> {
        let response = client.ping().await;
        let ping: PingResult = match expect_success(&response) {
            Ok(ping) => ping,
            Err(outcome) => return Ok(outcome),
        };
        match ping.pong {
            Some(true) => Ok(StepOutcome::passed(vec!["pong: true".to_string()])),
            other => Ok(StepOutcome::failed(format!(
                "expected pong: true, got {}",
                other.map_or("nothing".to_string(), |p| p.to_string())
            ))),
        }
    }
}
