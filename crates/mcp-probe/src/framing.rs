//! Newline-delimited framing for the server's stdio pipes.
//!
//! One JSON-RPC message per `\n`-terminated line, in both directions. The
//! writer side flushes after every frame so the peer sees it immediately.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Reads newline-terminated frames from an async reader.
///
/// Unlike a line iterator this keeps empty lines: an empty frame is a
/// protocol violation the caller has to see, not something to skip.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: BufReader<R>,
    /// Bytes of the line being assembled; survives a cancelled `next_line`.
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Create a new line reader wrapping the given async reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Read the next frame without its line terminator, returning `None` on EOF.
    ///
    /// A trailing `\r` is stripped as well. A final line that ends at EOF
    /// without a terminator is still returned.
    ///
    /// Cancel safe: if the future is dropped mid-line (e.g. by a timeout), the
    /// bytes read so far are kept and the next call completes the same line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails or the line is not UTF-8.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.reader.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }

        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8(line)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Write a frame in newline-delimited format to the given writer.
///
/// Appends `\n` and flushes. A `text` containing an embedded newline would
/// split into two frames, so it is rejected with `InvalidInput`.
///
/// # Errors
///
/// Returns an I/O error if writing or flushing fails.
pub async fn write_newline_delimited<W: AsyncWrite + Unpin>(
    writer: &mut W,
    text: &str,
) -> io::Result<()> {
    if text.contains('\n') {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "frame contains an embedded newline",
        ));
    }
    writer.write_all(text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
