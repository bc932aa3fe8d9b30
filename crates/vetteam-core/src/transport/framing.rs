//! Newline-delimited JSON framing.
//!
//! One message per line. `serde_json` escapes newlines inside strings, so a
//! raw `\n` can only ever be a frame terminator. A frame is handed out only
//! once its terminator has been read; bytes left over at end-of-stream are
//! reported as `MalformedFrame`.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::TransportError;

/// Upper bound for a single frame.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Reads complete frames from a byte stream.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    limit: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_FRAME_BYTES)
    }

    pub fn with_limit(reader: R, limit: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            limit,
        }
    }

    /// Next non-blank frame, or `None` at a clean end-of-stream.
    pub async fn read_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            self.buf.clear();
            let n = self.read_line_bounded().await?;
            if n == 0 {
                return Ok(None);
            }
            if self.buf.last() != Some(&b'\n') {
                return Err(TransportError::MalformedFrame(format!(
                    "stream ended inside a frame ({} bytes without terminator)",
                    self.buf.len()
                )));
            }
            let line = std::str::from_utf8(&self.buf)
                .map_err(|e| TransportError::InvalidMessage(format!("invalid UTF-8: {}", e)))?
                .trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Next frame decoded as JSON.
    pub async fn read_value(&mut self) -> Result<Option<Value>, TransportError> {
        match self.read_frame().await? {
            Some(line) => serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| TransportError::InvalidMessage(format!("invalid JSON: {}", e))),
            None => Ok(None),
        }
    }

    async fn read_line_bounded(&mut self) -> Result<usize, TransportError> {
        let mut total = 0;
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(total);
            }
            let (chunk_len, done) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            };
            let payload_len = self.buf.len() + chunk_len - usize::from(done);
            if payload_len > self.limit {
                return Err(TransportError::FrameTooLarge { limit: self.limit });
            }
            self.buf.extend_from_slice(&available[..chunk_len]);
            self.inner.consume(chunk_len);
            total += chunk_len;
            if done {
                return Ok(total);
            }
        }
    }
}

/// Writes frames to a byte stream, flushing after each one.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    pub async fn write_message<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), TransportError> {
        let mut data = serde_json::to_vec(message).map_err(TransportError::Encode)?;
        data.push(b'\n');
        self.inner.write_all(&data).await.map_err(closed_on_broken_pipe)?;
        self.inner.flush().await.map_err(closed_on_broken_pipe)?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await.map_err(closed_on_broken_pipe)
    }
}

fn closed_on_broken_pipe(err: std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset => {
            TransportError::Closed
        }
        _ => TransportError::Io(err),
    }
}
