//! Transport seam between the JSON-RPC client and the server under test.
//!
//! [`LineTransport`] is the trait the [`crate::rpc::RpcClient`] talks to. The
//! production implementation is [`crate::supervisor::ServerProcess`], which
//! owns a real child process. [`MockTransport`] is an in-memory double used
//! by tests to script server behaviour line by line and to observe exactly
//! what the client wrote.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// A bidirectional, newline-framed text channel to one server instance.
///
/// The trait is object-safe via [`async_trait`], so sessions hold a
/// `Box<dyn LineTransport>` and never know which implementation they drive.
#[async_trait]
pub trait LineTransport: Send + std::fmt::Debug {
    /// Whether the peer is still running. Must not block.
    fn is_alive(&mut self) -> bool;

    /// Write `text` plus a newline to the peer and flush.
    async fn write_line(&mut self, text: &str) -> io::Result<()>;

    /// Wait for the next complete line from the peer.
    ///
    /// Returns `Ok(None)` once the peer's output stream is closed.
    async fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Stop the peer and release its streams.
    ///
    /// Idempotent: calling it again after the peer stopped returns the same
    /// exit status without further side effects.
    async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>>;
}

/// In-memory [`LineTransport`] for tests.
///
/// Lines written by the client are forwarded to
/// [`MockTransportHandle::take_written`]; lines queued with
/// [`MockTransportHandle::respond`] are returned by `read_line` in order.
#[derive(Debug)]
pub struct MockTransport {
    written_tx: mpsc::UnboundedSender<String>,
    response_rx: mpsc::UnboundedReceiver<String>,
    alive: Arc<AtomicBool>,
    shutdowns: Arc<AtomicUsize>,
}

/// Test-side controls for a [`MockTransport`].
#[derive(Debug)]
pub struct MockTransportHandle {
    written_rx: mpsc::UnboundedReceiver<String>,
    response_tx: Option<mpsc::UnboundedSender<String>>,
    alive: Arc<AtomicBool>,
    shutdowns: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Create a live mock transport and its controlling handle.
    pub fn new_with_handle() -> (Self, MockTransportHandle) {
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let shutdowns = Arc::new(AtomicUsize::new(0));
        let transport = Self {
            written_tx,
            response_rx,
            alive: Arc::clone(&alive),
            shutdowns: Arc::clone(&shutdowns),
        };
        let handle = MockTransportHandle {
            written_rx,
            response_tx: Some(response_tx),
            alive,
            shutdowns,
        };
        (transport, handle)
    }
}

impl MockTransportHandle {
    /// Queue a raw line for the client to read.
    pub fn respond_raw(&self, line: impl Into<String>) {
        if let Some(tx) = &self.response_tx {
            let _ = tx.send(line.into());
        }
    }

    /// Queue a JSON value, serialized on one line, for the client to read.
    pub fn respond(&self, message: &Value) {
        self.respond_raw(message.to_string());
    }

    /// Close the server's output stream; pending lines are still delivered.
    pub fn close_output(&mut self) {
        self.response_tx = None;
    }

    /// Simulate the server process exiting.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Drain every line the client has written so far.
    pub fn take_written(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.written_rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    /// Drain written lines and parse each as JSON.
    pub fn take_written_json(&mut self) -> Vec<Value> {
        self.take_written()
            .iter()
            .map(|l| serde_json::from_str(l).unwrap_or(Value::Null))
            .collect()
    }

    /// Number of times `shutdown` was called on the transport.
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LineTransport for MockTransport {
    fn is_alive(&mut self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock peer is dead"));
        }
        self.written_tx
            .send(text.to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "mock handle dropped"))
    }

    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.response_rx.recv().await)
    }

    async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.alive.store(false, Ordering::SeqCst);
        self.response_rx.close();
        Ok(None)
    }
}
