//! ToolHost: serves a static tool registry over a framed JSON-RPC stream.
//!
//! Protocol (one JSON-RPC message per line):
//!   Client → initialize                 → host identity + capabilities
//!   Client → notifications/initialized  → (no reply)
//!   Client → tools/list                 → every registered descriptor
//!   Client → tools/call {name, args}    → one text content block
//!   Client → ping                       → {}
//!
//! The registry is immutable once serving starts; per-connection state
//! (the handshake flag) lives in [`ConnectionState`], one per `serve` call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{HostError, TransportError};
use crate::rpc::protocol::{
    CallToolParams, CallToolResult, ContentBlock, InitializeParams, InitializeResult,
    ListToolsResult, PeerInfo, ToolDescriptor, METHOD_CALL_TOOL, METHOD_INITIALIZE,
    METHOD_INITIALIZED, METHOD_LIST_TOOLS, METHOD_PING, PROTOCOL_VERSION,
};
use crate::rpc::types::{
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, NOT_INITIALIZED, PARSE_ERROR, TOOL_NOT_FOUND,
};
use crate::transport::{FrameReader, FrameWriter};

/// Synchronous tool implementation: arguments in, text out.
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> Result<String, String> + Send + Sync>;

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: ToolHandler,
}

/// Per-connection handshake state.
#[derive(Debug, Default)]
pub struct ConnectionState {
    pub initialized: bool,
    pub client: Option<PeerInfo>,
}

/// A named set of tools that can be served to clients.
pub struct ToolHost {
    info: PeerInfo,
    instructions: Option<String>,
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolHost {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: PeerInfo {
                name: name.into(),
                version: version.into(),
            },
            instructions: None,
            tools: BTreeMap::new(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Add a tool. Names are unique within a host.
    pub fn register<F>(&mut self, descriptor: ToolDescriptor, handler: F) -> Result<(), HostError>
    where
        F: Fn(&Map<String, Value>) -> Result<String, String> + Send + Sync + 'static,
    {
        if descriptor.name.trim().is_empty() {
            return Err(HostError::EmptyName);
        }
        if self.tools.contains_key(&descriptor.name) {
            return Err(HostError::DuplicateTool(descriptor.name));
        }
        tracing::debug!("[ToolHost] Registered tool '{}'", descriptor.name);
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                descriptor,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn info(&self) -> &PeerInfo {
        &self.info
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor.clone()).collect()
    }

    /// Answer one request. Notifications yield `None`.
    pub fn handle(&self, conn: &mut ConnectionState, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            match request.method.as_str() {
                METHOD_INITIALIZED => tracing::debug!("[ToolHost] Client confirmed initialization"),
                other => tracing::debug!("[ToolHost] Ignoring notification: {}", other),
            }
            return None;
        }

        let id = request.id.clone();
        let params = request.params.unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            METHOD_INITIALIZE => self.handle_initialize(conn, id, params),
            METHOD_PING => JsonRpcResponse::success(id, json!({})),
            METHOD_LIST_TOOLS | METHOD_CALL_TOOL if !conn.initialized => JsonRpcResponse::error(
                id,
                NOT_INITIALIZED,
                format!("Session not initialized; call '{}' first", METHOD_INITIALIZE),
            ),
            METHOD_LIST_TOOLS => {
                let result = ListToolsResult {
                    tools: self.descriptors(),
                };
                encode_result(id, &result)
            }
            METHOD_CALL_TOOL => self.handle_call_tool(id, params),
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };
        Some(response)
    }

    fn handle_initialize(
        &self,
        conn: &mut ConnectionState,
        id: Option<Value>,
        params: Value,
    ) -> JsonRpcResponse {
        let params: InitializeParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid initialize params: {}", e))
            }
        };
        tracing::info!(
            "[ToolHost] Initialize from {} {} (protocol {})",
            params.client_info.name,
            params.client_info.version,
            params.protocol_version
        );
        conn.initialized = true;
        conn.client = Some(params.client_info);

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: self.info.clone(),
            capabilities: json!({ "tools": {} }),
            instructions: self.instructions.clone(),
        };
        encode_result(id, &result)
    }

    fn handle_call_tool(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let params: CallToolParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid tools/call params: {}", e))
            }
        };

        let Some(tool) = self.tools.get(&params.name) else {
            return JsonRpcResponse::error(id, TOOL_NOT_FOUND, format!("Tool not found: {}", params.name));
        };

        if let Err(reason) = tool.descriptor.input_schema.validate(&params.arguments) {
            return JsonRpcResponse::error(id, INVALID_PARAMS, reason);
        }

        tracing::info!("[ToolHost] Calling tool '{}'", params.name);
        let result = match (tool.handler)(&params.arguments) {
            Ok(text) => CallToolResult::success(vec![ContentBlock::text(text)]),
            Err(message) => {
                tracing::warn!("[ToolHost] Tool '{}' failed: {}", params.name, message);
                CallToolResult::failure(message)
            }
        };
        encode_result(id, &result)
    }

    /// Serve one connection until the reader reaches end-of-stream.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), TransportError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut reader = FrameReader::new(reader);
        let mut writer = FrameWriter::new(writer);
        let mut conn = ConnectionState::default();

        tracing::info!("[ToolHost] {} serving {} tool(s)", self.info.name, self.tools.len());

        loop {
            let value = match reader.read_value().await {
                Ok(Some(value)) => value,
                Ok(None) => break,
                Err(TransportError::InvalidMessage(e)) => {
                    let resp = JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e));
                    writer.write_message(&resp).await?;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let response = match JsonRpcMessage::from_value(value.clone()) {
                Ok(JsonRpcMessage::Request(req)) | Ok(JsonRpcMessage::Notification(req)) => {
                    self.handle(&mut conn, req)
                }
                Ok(JsonRpcMessage::Response(resp)) => {
                    tracing::debug!("[ToolHost] Ignoring response from client (id={:?})", resp.id);
                    None
                }
                Err(e) => Some(JsonRpcResponse::error(
                    value.get("id").cloned(),
                    INVALID_REQUEST,
                    format!("Invalid request: {}", e),
                )),
            };

            if let Some(response) = response {
                writer.write_message(&response).await?;
            }
        }

        tracing::info!("[ToolHost] Input closed, shutting down");
        Ok(())
    }

    /// Serve this process's stdin/stdout.
    pub async fn serve_stdio(&self) -> Result<(), TransportError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

/// Success response carrying `result`, or an internal error if it cannot be encoded.
fn encode_result<T: Serialize>(id: Option<Value>, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            tracing::error!("[ToolHost] Failed to encode result: {}", e);
            JsonRpcResponse::error_with_data(
                id,
                INTERNAL_ERROR,
                "Internal error",
                json!({ "detail": e.to_string() }),
            )
        }
    }
}
