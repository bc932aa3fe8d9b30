//! Byte-stream transport carrying framed JSON-RPC messages.
//!
//! A `Transport` owns one reader half, one writer half and, when it was
//! created by [`Transport::launch`], the child process behind them.
//!
//! ```text
//! Transport::launch(spec) ──► child stdin  ◄── send(msg)
//!                             child stdout ──► receive()
//!                             child stderr ──► tracing::debug
//! Transport::from_io(r, w) ── any AsyncRead/AsyncWrite pair (duplex, sockets)
//! ```

pub mod framing;
pub mod process;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::{watch, Mutex};

use crate::error::TransportError;
use crate::rpc::types::JsonRpcMessage;

pub use framing::{FrameReader, FrameWriter, MAX_FRAME_BYTES};
pub use process::LaunchSpec;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A framed, bidirectional message channel.
pub struct Transport {
    label: String,
    reader: Mutex<FrameReader<BoxedReader>>,
    writer: Mutex<FrameWriter<BoxedWriter>>,
    child: Mutex<Option<Child>>,
    closed: watch::Sender<bool>,
}

impl Transport {
    /// Wrap an existing reader/writer pair.
    pub fn from_io<R, W>(label: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::assemble(label.into(), Box::new(reader), Box::new(writer), None)
    }

    fn assemble(
        label: String,
        reader: BoxedReader,
        writer: BoxedWriter,
        child: Option<Child>,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            label,
            reader: Mutex::new(FrameReader::new(reader)),
            writer: Mutex::new(FrameWriter::new(writer)),
            child: Mutex::new(child),
            closed,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Write one message as a single frame.
    pub async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_message(message).await
    }

    /// Wait for the next complete message.
    ///
    /// Fails with `Closed` at end-of-stream or as soon as `close` is called,
    /// even while blocked on the read.
    pub async fn receive(&self) -> Result<JsonRpcMessage, TransportError> {
        let mut closed_rx = self.closed.subscribe();
        if *closed_rx.borrow_and_update() {
            return Err(TransportError::Closed);
        }
        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = closed_rx.wait_for(|closed| *closed) => Err(TransportError::Closed),
            frame = reader.read_value() => match frame? {
                Some(value) => JsonRpcMessage::from_value(value).map_err(TransportError::InvalidMessage),
                None => Err(TransportError::Closed),
            },
        }
    }

    /// Terminate the child (if any) and release both pipe halves. Idempotent.
    pub async fn close(&self) {
        let was_closed = self.closed.send_replace(true);

        if let Some(mut child) = self.child.lock().await.take() {
            tracing::info!("[Transport:{}] Killing child process", self.label);
            if let Err(e) = child.kill().await {
                tracing::debug!("[Transport:{}] kill: {}", self.label, e);
            }
        }

        if was_closed {
            return;
        }

        // A writer stuck on a full pipe gives up the lock once the child is gone.
        match tokio::time::timeout(Duration::from_secs(1), self.writer.lock()).await {
            Ok(mut writer) => {
                let _ = writer.shutdown().await;
            }
            Err(_) => tracing::warn!("[Transport:{}] writer busy during close", self.label),
        }
        tracing::debug!("[Transport:{}] closed", self.label);
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}
