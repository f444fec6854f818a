//! Mock MCP server for integration testing.
//!
//! Reads newline-delimited JSON from stdin and writes newline-delimited JSON
//! responses to stdout. Every received method is also logged to stderr so the
//! harness's stderr capture can be observed.
//!
//! # Supported methods
//!
//! - `initialize`: protocol `2024-11-05`, tools capability
//! - `initialized`: empty (`null`) result
//! - `tools/list`: `echo`, `get_system_info`, `list_files`
//! - `tools/call`: echoes `text` verbatim, reports the platform, lists a directory
//! - `ping`: `{"pong": true}`
//!
//! # Failure modes (`ECHO_MCP_MODE`)
//!
//! - `normal` (default): behave
//! - `malformed`: answer `initialize` with a non-JSON line
//! - `silent`: read requests, never answer
//! - `exit`: exit with code 3 on the first request
//! - `wrong-id`: answer `initialize` with an unrelated id
//! - `error`: answer every `tools/call` with a JSON-RPC error
//! - `notify`: send a notification and a server request before every response
//! - `slow-echo`: delay the `echo` result by `ECHO_MCP_DELAY_MS` (default 500)
//! - `stubborn`: keep running after stdin closes until signalled

use serde_json::{Value, json};
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

struct Fixture {
    mode: String,
    quiet: bool,
}

fn main() {
    let fixture = Fixture {
        mode: std::env::var("ECHO_MCP_MODE").unwrap_or_else(|_| "normal".to_string()),
        quiet: std::env::args().skip(1).any(|a| a == "--quiet"),
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let reader = BufReader::new(stdin.lock());
    let mut writer = stdout.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        fixture.handle_message(&msg, &mut writer);
    }

    if fixture.mode == "stubborn" {
        eprintln!("echo-mcp-server: stdin closed, staying up");
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}

impl Fixture {
    fn handle_message(&self, msg: &Value, writer: &mut impl Write) {
        let method = msg.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        eprintln!("echo-mcp-server: received {method}");

        match self.mode.as_str() {
            "silent" => return,
            "exit" => std::process::exit(3),
            "malformed" if method == "initialize" => {
                writeln!(writer, "this is not json").expect("write to stdout");
                writer.flush().expect("flush stdout");
                return;
            }
            "wrong-id" if method == "initialize" => {
                write_msg(writer, &json!({"jsonrpc": "2.0", "id": 9999, "result": {}}));
                return;
            }
            "notify" => {
                write_msg(
                    writer,
                    &json!({"jsonrpc": "2.0", "method": "notifications/message",
                            "params": {"level": "info", "data": "working"}}),
                );
                write_msg(
                    writer,
                    &json!({"jsonrpc": "2.0", "id": "srv-1", "method": "roots/list"}),
                );
            }
            _ => {}
        }

        let outcome = match method {
            "initialize" => Ok(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "echo-mcp-server", "version": "0.1.0" }
            })),
            "initialized" => Ok(Value::Null),
            "tools/list" => Ok(json!({
                "tools": [
                    {
                        "name": "echo",
                        "description": "Echo back the provided text",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "text": {"type": "string"} },
                            "required": ["text"]
                        }
                    },
                    {
                        "name": "get_system_info",
                        "description": "Report basic platform information",
                        "inputSchema": { "type": "object", "properties": {} }
                    },
                    {
                        "name": "list_files",
                        "description": "List the entries of a directory",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "path": {"type": "string"} }
                        }
                    }
                ]
            })),
            "tools/call" => self.call_tool(msg),
            "ping" => Ok(json!({ "pong": true })),
            unknown => Err((-32601, format!("Method not found: {unknown}"))),
        };

        let resp = match outcome {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err((code, message)) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            }),
        };
        write_msg(writer, &resp);
    }

    fn call_tool(&self, msg: &Value) -> Result<Value, (i64, String)> {
        let tool_name = msg
            .pointer("/params/name")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let arguments = msg
            .pointer("/params/arguments")
            .cloned()
            .unwrap_or(json!({}));

        if self.mode == "error" {
            return Err((-32000, format!("tool {tool_name} is broken")));
        }

        let text = match tool_name {
            "echo" => {
                if self.mode == "slow-echo" {
                    let delay = std::env::var("ECHO_MCP_DELAY_MS")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(500);
                    std::thread::sleep(Duration::from_millis(delay));
                }
                arguments
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            }
            "get_system_info" => format!(
                "os: {}\narch: {}\nquiet: {}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                self.quiet
            ),
            "list_files" => {
                let path = arguments.get("path").and_then(|v| v.as_str()).unwrap_or(".");
                let mut names: Vec<String> = std::fs::read_dir(path)
                    .map_err(|e| (-32602, format!("cannot list {path}: {e}")))?
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect();
                names.sort();
                format!("{} entries in {path}\n{}", names.len(), names.join("\n"))
            }
            other => return Err((-32602, format!("Unknown tool: {other}"))),
        };

        Ok(json!({ "content": [{ "type": "text", "text": text }] }))
    }
}

fn write_msg(writer: &mut impl Write, msg: &Value) {
    let s = serde_json::to_string(msg).expect("serialize JSON");
    writeln!(writer, "{s}").expect("write to stdout");
    writer.flush().expect("flush stdout");
}
