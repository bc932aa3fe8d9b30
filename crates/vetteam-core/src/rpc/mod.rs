//! Wire layer shared by the tool host and the tool client.
//!
//! - `types`: JSON-RPC 2.0 envelopes and error codes
//! - `protocol`: method names and typed payloads (descriptors, content blocks)

pub mod protocol;
pub mod types;

pub use protocol::{
    CallToolParams, CallToolResult, ContentBlock, InitializeParams, InitializeResult,
    InputSchema, ListToolsResult, ParamSpec, ParamType, PeerInfo, ToolDescriptor,
};
pub use types::{JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
