//! Newline-delimited line framing over an async byte stream
//!
//! [`LineReader`] owns the per-connection buffer of bytes that have arrived
//! but are not yet terminated. [`LineWriter`] appends the delimiter and turns
//! every transport fault into a `false` return so callers decide how to tear
//! the connection down. Neither side knows anything about prompts, pings or
//! quit handling.

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes requested from the transport per read call.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Reads newline-terminated lines, tolerating arbitrary chunk boundaries.
pub struct LineReader<R> {
    inner: R,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Returns the next line without its delimiter, or `None` at end of stream.
    ///
    /// A line may end in `"\r\n"` or `"\n"`. Bytes after the delimiter stay
    /// buffered for the next call. When the transport is exhausted a
    /// non-empty unterminated remainder is returned once as a final line.
    /// A connection reset counts as end of stream.
    ///
    /// Cancel safe: bytes are only moved into the buffer once a read has
    /// completed, so dropping the future loses nothing.
    pub async fn read_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.take_line() {
                return Some(line);
            }

            if self.exhausted {
                return self.take_remainder();
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.inner.read(&mut chunk).await {
                Ok(0) => self.exhausted = true,
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!("Read failed, treating as end of stream: {}", e);
                    self.exhausted = true;
                }
            }
        }
    }

    /// Number of buffered bytes not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn take_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Writes lines, appending the delimiter when missing.
pub struct LineWriter<W> {
    inner: W,
    closing: bool,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closing: false,
        }
    }

    /// Writes one line. Returns `false` if the writer is closing or the
    /// transport reported any error (reset, broken pipe, ...).
    pub async fn write_line(&mut self, message: &str) -> bool {
        if self.closing {
            warn!("Write rejected, writer is closing: {:?}", message);
            return false;
        }

        let mut data = String::with_capacity(message.len() + 1);
        data.push_str(message);
        if !data.ends_with('\n') {
            data.push('\n');
        }

        if let Err(e) = self.inner.write_all(data.as_bytes()).await {
            warn!("Write failed: {}", e);
            return false;
        }
        if let Err(e) = self.inner.flush().await {
            warn!("Flush failed: {}", e);
            return false;
        }
        true
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Marks the writer closing and shuts the transport down. Idempotent.
    pub async fn close(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        if let Err(e) = self.inner.shutdown().await {
            debug!("Shutdown after close failed: {}", e);
        }
    }
}
