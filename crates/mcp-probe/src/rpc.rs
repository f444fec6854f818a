//! JSON-RPC 2.0 client over a [`LineTransport`].
//!
//! [`RpcClient`] is strictly sequential: [`RpcClient::call`] writes one
//! request line and waits for the matching response before returning, so at
//! most one request is ever in flight.
//!
//! Every call yields exactly one [`Response`]. Expected failure modes never
//! surface as `Err`; they are folded into [`Response::TransportError`] so
//! callers branch on a single sum type:
//!
//! | Condition                         | Result                                  |
//! |-----------------------------------|-----------------------------------------|
//! | server sent `result`              | [`Response::Success`]                   |
//! | server sent `error`               | [`Response::ProtocolError`]             |
//! | server not running before write   | [`TransportError::NotRunning`], no I/O  |
//! | empty line / closed stream        | `EmptyResponse` / `StreamClosed`        |
//! | undecodable line                  | `MalformedJson` / `InvalidEnvelope`     |
//! | no response before the deadline   | [`TransportError::Timeout`]             |
//! | response for a different id       | [`TransportError::IdMismatch`]          |
//!
//! Ids start at 1 and are consumed once per call, including calls that fail,
//! so an id is never reused within a session.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::transport::LineTransport;

/// JSON-RPC protocol version string sent on every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Deadline applied by [`RpcClient::call`] unless overridden.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Longest excerpt of an offending line kept in error messages.
const LINE_EXCERPT_CHARS: usize = 200;

/// One outgoing request envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Always `"2.0"`
    pub jsonrpc: &'static str,
    /// Correlation id, unique within the session
    pub id: u64,
    /// Remote method name
    pub method: String,
    /// Parameters; omitted from the wire entirely when `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Build a request envelope.
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }
}

/// Error object from a server `error` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
    /// Optional extra data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Decode an `error` payload leniently.
    ///
    /// A payload that is not a well-formed error object is kept verbatim in
    /// `data` with code `0`, so nothing the server sent is lost.
    pub fn from_payload(payload: Value) -> Self {
        match serde_json::from_value::<RpcError>(payload.clone()) {
            Ok(err) => err,
            Err(_) => {
                let message = match &payload {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self {
                    code: 0,
                    message,
                    data: Some(payload),
                }
            }
        }
    }
}

/// Failures synthesized locally when no well-formed response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server process was not running; nothing was written.
    #[error("server process is not running")]
    NotRunning,

    /// The server answered with an empty line.
    #[error("empty response from server")]
    EmptyResponse,

    /// The server closed its output without answering.
    #[error("no response from server: output stream closed")]
    StreamClosed,

    /// The response line is not JSON.
    #[error("malformed JSON from server ({reason}): {line}")]
    MalformedJson {
        /// Excerpt of the offending line
        line: String,
        /// Parser message
        reason: String,
    },

    /// The response is JSON but not a JSON-RPC response envelope.
    #[error("invalid JSON-RPC envelope from server: {line}")]
    InvalidEnvelope {
        /// Excerpt of the offending line
        line: String,
    },

    /// No response arrived before the deadline.
    #[error("timed out after {}ms waiting for response", .0.as_millis())]
    Timeout(Duration),

    /// The response carries a different id than the request.
    #[error("response id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        /// Id that was sent
        expected: u64,
        /// Id that came back
        actual: String,
    },

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Reading from or writing to the server's streams failed.
    #[error("I/O error talking to server: {0}")]
    Io(String),
}

/// Outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The server returned `result`.
    Success {
        /// Id echoed by the server
        id: Value,
        /// Result payload, verbatim
        result: Value,
    },
    /// The server returned `error`.
    ProtocolError {
        /// Id echoed by the server (may be `null`)
        id: Value,
        /// Decoded error object
        error: RpcError,
    },
    /// No usable response could be obtained.
    TransportError(TransportError),
}

/// Why a [`Response`] could not be decoded into a typed result.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The response was not a success.
    #[error("{0}")]
    NotSuccess(String),
    /// The result did not have the expected shape.
    #[error("unexpected result shape: {0}")]
    Shape(#[from] serde_json::Error),
}

impl Response {
    /// Whether this is a [`Response::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether this carries an error of either kind.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Whether this is a [`TransportError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TransportError(TransportError::Timeout(_)))
    }

    /// The result payload of a success.
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Short classification used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ProtocolError { .. } => "protocol_error",
            Self::TransportError(_) => "transport_error",
        }
    }

    /// One-line description of the failure, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::ProtocolError { error, .. } => {
                Some(format!("server error {}: {}", error.code, error.message))
            }
            Self::TransportError(e) => Some(e.to_string()),
        }
    }

    /// Decode the result payload of a success into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        match self {
            Self::Success { result, .. } => Ok(T::deserialize(result)?),
            other => Err(DecodeError::NotSuccess(
                other.error_message().unwrap_or_default(),
            )),
        }
    }

    /// Render back into the untyped envelope shape.
    ///
    /// Transport errors become `{"error": "<description>"}` with no id.
    pub fn to_envelope(&self) -> Value {
        match self {
            Self::Success { id, result } => {
                json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result})
            }
            Self::ProtocolError { id, error } => {
                json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error})
            }
            Self::TransportError(e) => json!({"error": e.to_string()}),
        }
    }
}

fn excerpt(line: &str) -> String {
    if line.chars().count() <= LINE_EXCERPT_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(LINE_EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}

/// What one line read from the server turned out to be.
#[derive(Debug, PartialEq)]
enum Incoming {
    /// The response to the pending request
    Response(Response),
    /// A server notification, or a late answer to an earlier timed-out call
    Ignorable(&'static str),
}

/// Classify one line read while waiting for the response to `expected_id`.
fn classify_line(line: &str, expected_id: u64) -> Result<Incoming, TransportError> {
    if line.trim().is_empty() {
        return Err(TransportError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(line).map_err(|e| TransportError::MalformedJson {
        line: excerpt(line),
        reason: e.to_string(),
    })?;
    let Value::Object(mut obj) = value else {
        return Err(TransportError::InvalidEnvelope {
            line: excerpt(line),
        });
    };

    let id = obj.remove("id");
    if obj.contains_key("method") {
        return Ok(Incoming::Ignorable(if id.is_some() {
            "server request"
        } else {
            "notification"
        }));
    }

    let id = id.unwrap_or(Value::Null);
    let is_error = obj.contains_key("error");
    if !is_error && !obj.contains_key("result") {
        return Err(TransportError::InvalidEnvelope {
            line: excerpt(line),
        });
    }

    match id.as_u64() {
        Some(actual) if actual == expected_id => {}
        Some(actual) if actual < expected_id => return Ok(Incoming::Ignorable("stale response")),
        // A server that could not read the request answers with a null id
        None if id.is_null() && is_error => {}
        _ => {
            return Err(TransportError::IdMismatch {
                expected: expected_id,
                actual: id.to_string(),
            });
        }
    }

    let response = if is_error {
        Response::ProtocolError {
            id,
            error: RpcError::from_payload(obj.remove("error").unwrap_or(Value::Null)),
        }
    } else {
        Response::Success {
            id,
            result: obj.remove("result").unwrap_or(Value::Null),
        }
    };
    Ok(Incoming::Response(response))
}

/// Sequential JSON-RPC client owning one transport and one id counter.
#[derive(Debug)]
pub struct RpcClient {
    transport: Box<dyn LineTransport>,
    next_id: u64,
    default_deadline: Duration,
}

impl RpcClient {
    /// Create a client over `transport`; the first request gets id 1.
    pub fn new(transport: Box<dyn LineTransport>) -> Self {
        Self {
            transport,
            next_id: 1,
            default_deadline: DEFAULT_DEADLINE,
        }
    }

    /// Replace the deadline used by [`RpcClient::call`].
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// The id the next call will use.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// The deadline used by [`RpcClient::call`].
    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Whether the underlying server is still running.
    pub fn is_alive(&mut self) -> bool {
        self.transport.is_alive()
    }

    /// Call `method` using the default deadline.
    pub async fn call(&mut self, method: &str, params: Option<Value>) -> Response {
        let deadline = self.default_deadline;
        self.call_with_deadline(method, params, deadline).await
    }

    /// Call `method`, waiting at most `deadline` for the response.
    pub async fn call_with_deadline(
        &mut self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Response {
        let id = self.next_id;
        self.next_id += 1;

        if !self.transport.is_alive() {
            tracing::warn!(id, method, "server not running; request not sent");
            return Response::TransportError(TransportError::NotRunning);
        }

        let request = Request::new(id, method, params);
        let line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(e) => return Response::TransportError(TransportError::Encode(e.to_string())),
        };

        tracing::debug!(id, method, direction = "probe->server", "{line}");
        if let Err(e) = self.transport.write_line(&line).await {
            tracing::warn!(id, method, "failed to write request: {e}");
            return Response::TransportError(TransportError::Io(e.to_string()));
        }

        // Reads are cancel safe: a line cut off by the deadline is completed
        // by the next call and then skipped as stale.
        match tokio::time::timeout(deadline, self.read_response(id)).await {
            Ok(response) => {
                if let Some(message) = response.error_message() {
                    tracing::info!(id, method, kind = response.kind(), "call failed: {message}");
                }
                response
            }
            Err(_) => {
                tracing::warn!(id, method, ?deadline, "request timed out");
                Response::TransportError(TransportError::Timeout(deadline))
            }
        }
    }

    async fn read_response(&mut self, id: u64) -> Response {
        loop {
            let line = match self.transport.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Response::TransportError(TransportError::StreamClosed),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Response::TransportError(TransportError::StreamClosed);
                }
                Err(e) => return Response::TransportError(TransportError::Io(e.to_string())),
            };
            tracing::debug!(id, direction = "server->probe", "{line}");

            match classify_line(&line, id) {
                Ok(Incoming::Response(response)) => return response,
                Ok(Incoming::Ignorable(what)) => {
                    tracing::debug!(id, "skipping {what} while waiting for response");
                }
                Err(e) => return Response::TransportError(e),
            }
        }
    }

    /// Stop the underlying server. Safe to call more than once.
    pub async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>> {
        self.transport.shutdown().await
    }
}
