//! Error taxonomy for the vetteam core.
//!
//! Transport, protocol and invocation errors are produced by the tool
//! client/host pair. `ToolClientError` is what session operations return;
//! the research stage folds it into a degraded text result. Graph
//! validation and stage errors belong to the workflow executor.

use std::fmt;

use crate::rpc::types::JsonRpcError;

/// Boxed cause used at the stage boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Byte-stream failures: spawning, pipes, framing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to spawn '{command}': {source}. Is it installed and in PATH?")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport closed")]
    Closed,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A complete frame that is not a usable JSON-RPC message. The stream
    /// itself is still intact.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the stream can keep being read after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::InvalidMessage(_))
    }
}

/// The peer spoke JSON-RPC but not the way we expected.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("RPC error [{code}]: {message}")]
    Rpc { code: i64, message: String },
}

impl From<JsonRpcError> for ProtocolError {
    fn from(err: JsonRpcError) -> Self {
        ProtocolError::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// A `tools/call` that reached the host but did not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("malformed arguments for '{tool}': {reason}")]
    MalformedArguments { tool: String, reason: String },

    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },
}

/// Lifecycle of a tool-host session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a session operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ToolClientError {
    #[error("could not open session: {0}")]
    Connect(#[source] Box<ToolClientError>),

    #[error("session is {actual}, operation requires ready")]
    State { actual: SessionStatus },

    #[error("timeout waiting for {method} (id={id}, {timeout_ms}ms)")]
    Timeout {
        method: String,
        id: u64,
        timeout_ms: u128,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Rejected workflow graph. Always fatal at build time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphValidationError {
    #[error("no entry point set")]
    MissingEntry,

    #[error("entry point '{0}' is not a node")]
    UnknownEntry(String),

    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    #[error("'{0}' is reserved for the terminal sentinel")]
    ReservedName(String),

    #[error("edge source '{0}' is not a node")]
    UnknownEdgeSource(String),

    #[error("edge {source_node} -> {target} points at an unknown node")]
    UnknownEdgeTarget { source_node: String, target: String },

    #[error("node '{0}' already has an outgoing transition")]
    DuplicateTransition(String),

    #[error("node '{0}' is reachable but has no outgoing transition")]
    DeadEnd(String),

    #[error("cycle reachable from entry: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// A stage failed; the run was aborted.
///
/// `state` is the accumulated state as of the last node that completed.
#[derive(Debug, thiserror::Error)]
#[error("stage '{node}' failed: {source}")]
pub struct StageError<S: fmt::Debug> {
    pub node: String,
    #[source]
    pub source: BoxError,
    pub state: S,
}

/// Text-completion failures.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("no API key configured for provider '{provider}' (set {hint})")]
    MissingCredential { provider: String, hint: String },

    #[error("unknown completion provider: '{0}'")]
    UnknownProvider(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Assembling the research team from configuration failed.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("invalid workflow graph: {0}")]
    Graph(#[from] GraphValidationError),
}

/// Tool registry construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("tool name must not be empty")]
    EmptyName,
}
