//! ToolClient: sessions with a tool host over a [`Transport`].
//!
//! Session lifecycle:
//!   1. `attach(transport)`: start the background reader (uninitialized)
//!   2. `initialize()`: handshake; ready only after the host answers
//!   3. `discover()`: `tools/list`, cached on the session
//!   4. `invoke(name, args)`: `tools/call`, correlated by request id
//!   5. `close()`: kill the transport, fail anything in flight
//!
//! `uninitialized -> initializing -> ready -> closed`; a transport failure
//! moves any state to `closed`. Only `initialize` and `close` are accepted
//! outside `ready`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::{InvocationError, ProtocolError, SessionStatus, ToolClientError, TransportError};
use crate::rpc::protocol::{
    CallToolResult, ContentBlock, InitializeParams, InitializeResult, ListToolsResult, PeerInfo,
    ToolDescriptor, METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_LIST_TOOLS,
    METHOD_PING, PROTOCOL_VERSION,
};
use crate::rpc::types::{
    JsonRpcError, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS,
    METHOD_NOT_FOUND, TOOL_NOT_FOUND,
};
use crate::transport::{LaunchSpec, Transport};

type Waiter = oneshot::Sender<Result<Value, JsonRpcError>>;

/// Client identity and timeouts.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_name: String,
    pub client_version: String,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "vetteam".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            handshake_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A `tools/call` about to be sent.
#[derive(Debug, Clone)]
pub struct ToolInvocationRequest {
    pub correlation_id: u64,
    pub tool: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocationRequest {
    fn into_rpc(self) -> JsonRpcRequest {
        JsonRpcRequest::new(
            self.correlation_id,
            METHOD_CALL_TOOL,
            json!({ "name": self.tool, "arguments": self.arguments }),
        )
    }
}

/// Successful `tools/call` outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub correlation_id: u64,
    pub tool: String,
    pub content: Vec<ContentBlock>,
}

impl ToolInvocationResult {
    /// Every text block, concatenated in order.
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentBlock::as_text).collect()
    }
}

/// Opens sessions.
#[derive(Debug, Clone, Default)]
pub struct ToolClient {
    config: ClientConfig,
}

impl ToolClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Launch the host process and complete the handshake.
    pub async fn open(&self, spec: &LaunchSpec) -> Result<ToolSession, ToolClientError> {
        let transport = Transport::launch(spec)
            .map_err(|e| ToolClientError::Connect(Box::new(ToolClientError::Transport(e))))?;
        self.connect(transport).await
    }

    /// Handshake over an already-established transport.
    pub async fn connect(&self, transport: Transport) -> Result<ToolSession, ToolClientError> {
        let session = self.attach(transport);
        match session.initialize().await {
            Ok(_) => Ok(session),
            Err(e) => {
                session.close().await;
                Err(ToolClientError::Connect(Box::new(e)))
            }
        }
    }

    /// Wrap a transport in an uninitialized session.
    pub fn attach(&self, transport: Transport) -> ToolSession {
        ToolSession::start(transport, self.config.clone())
    }
}

struct SessionInner {
    transport: Transport,
    pending: Mutex<HashMap<u64, Waiter>>,
    next_id: AtomicU64,
    status: watch::Sender<SessionStatus>,
    host_info: OnceLock<InitializeResult>,
    tools: RwLock<Option<Vec<ToolDescriptor>>>,
    config: ClientConfig,
}

/// One conversation with a tool host.
pub struct ToolSession {
    inner: Arc<SessionInner>,
    reader: JoinHandle<()>,
}

impl ToolSession {
    fn start(transport: Transport, config: ClientConfig) -> Self {
        let (status, _) = watch::channel(SessionStatus::Uninitialized);
        let inner = Arc::new(SessionInner {
            transport,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            status,
            host_info: OnceLock::new(),
            tools: RwLock::new(None),
            config,
        });
        let reader = tokio::spawn(read_loop(inner.clone()));
        Self { inner, reader }
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    pub fn label(&self) -> &str {
        self.inner.transport.label()
    }

    /// Host identity, available once ready.
    pub fn host_info(&self) -> Option<&InitializeResult> {
        self.inner.host_info.get()
    }

    pub async fn cached_tools(&self) -> Option<Vec<ToolDescriptor>> {
        self.inner.tools.read().await.clone()
    }

    /// Perform the `initialize` handshake. Valid only once, from uninitialized.
    pub async fn initialize(&self) -> Result<InitializeResult, ToolClientError> {
        let started = self.inner.status.send_if_modified(|status| {
            if *status == SessionStatus::Uninitialized {
                *status = SessionStatus::Initializing;
                true
            } else {
                false
            }
        });
        if !started {
            return Err(ToolClientError::State {
                actual: self.status(),
            });
        }

        match self.handshake().await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!("[ToolClient:{}] Handshake failed: {}", self.label(), e);
                self.close().await;
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<InitializeResult, ToolClientError> {
        let config = &self.inner.config;
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_info: PeerInfo {
                name: config.client_name.clone(),
                version: config.client_version.clone(),
            },
            capabilities: json!({}),
        };
        let params = serde_json::to_value(params).map_err(TransportError::Encode)?;

        let (_, value) = self
            .inner
            .call(METHOD_INITIALIZE, params, config.handshake_timeout)
            .await
            .map_err(|e| match e {
                ToolClientError::Protocol(ProtocolError::Rpc { code, message }) => {
                    ToolClientError::Protocol(ProtocolError::HandshakeRejected(format!(
                        "[{}] {}",
                        code, message
                    )))
                }
                other => other,
            })?;

        let result: InitializeResult = serde_json::from_value(value).map_err(|e| {
            ProtocolError::HandshakeRejected(format!("invalid initialize result: {}", e))
        })?;

        self.inner
            .transport
            .send(&JsonRpcMessage::from(JsonRpcRequest::notification(METHOD_INITIALIZED, None)))
            .await?;

        let ready = self.inner.status.send_if_modified(|status| {
            if *status == SessionStatus::Initializing {
                *status = SessionStatus::Ready;
                true
            } else {
                false
            }
        });
        if !ready {
            return Err(ToolClientError::Transport(TransportError::Closed));
        }

        tracing::info!(
            "[ToolClient:{}] Initialized: {} {} (protocol {})",
            self.label(),
            result.server_info.name,
            result.server_info.version,
            result.protocol_version
        );
        let _ = self.inner.host_info.set(result.clone());
        Ok(result)
    }

    /// List the host's tools and cache them on the session.
    pub async fn discover(&self) -> Result<Vec<ToolDescriptor>, ToolClientError> {
        self.ensure_ready()?;
        let (_, value) = self
            .inner
            .call(METHOD_LIST_TOOLS, json!({}), self.inner.config.request_timeout)
            .await?;
        let listed: ListToolsResult = serde_json::from_value(value).map_err(|e| {
            ProtocolError::UnexpectedMessage(format!("invalid tools/list result: {}", e))
        })?;

        tracing::info!(
            "[ToolClient:{}] Discovered {} tool(s): {}",
            self.label(),
            listed.tools.len(),
            listed.tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        *self.inner.tools.write().await = Some(listed.tools.clone());
        Ok(listed.tools)
    }

    /// Call a tool and wait for its correlated result.
    pub async fn invoke(
        &self,
        tool: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolInvocationResult, ToolClientError> {
        self.ensure_ready()?;

        let request = ToolInvocationRequest {
            correlation_id: self.inner.next_id(),
            tool: tool.to_string(),
            arguments,
        };
        let id = request.correlation_id;
        tracing::debug!("[ToolClient:{}] tools/call {} (id={})", self.label(), tool, id);

        let value = self
            .inner
            .roundtrip(request.into_rpc(), self.inner.config.request_timeout)
            .await
            .map_err(|e| classify_call_error(tool, e))?;

        let result: CallToolResult = serde_json::from_value(value).map_err(|e| {
            ProtocolError::UnexpectedMessage(format!("invalid tools/call result: {}", e))
        })?;
        if result.is_error {
            return Err(InvocationError::ToolFailed {
                tool: tool.to_string(),
                message: result.joined_text(),
            }
            .into());
        }

        Ok(ToolInvocationResult {
            correlation_id: id,
            tool: tool.to_string(),
            content: result.content,
        })
    }

    /// Release the transport and fail every in-flight call. Idempotent.
    pub async fn close(&self) {
        if self.inner.mark_closed().await {
            tracing::info!("[ToolClient:{}] Closing session", self.label());
        }
        self.inner.transport.close().await;
    }

    fn ensure_ready(&self) -> Result<(), ToolClientError> {
        match self.status() {
            SessionStatus::Ready => Ok(()),
            actual => Err(ToolClientError::State { actual }),
        }
    }
}

impl Drop for ToolSession {
    fn drop(&mut self) {
        // Dropping the last Arc drops the transport, and the child with it.
        self.reader.abort();
    }
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("transport", &self.inner.transport)
            .field("status", &self.status())
            .finish()
    }
}

impl SessionInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<(u64, Value), ToolClientError> {
        let id = self.next_id();
        let value = self
            .roundtrip(JsonRpcRequest::new(id, method, params), timeout)
            .await?;
        Ok((id, value))
    }

    /// Send a request and wait for the response carrying the same id.
    async fn roundtrip(
        &self,
        request: JsonRpcRequest,
        timeout: Duration,
    ) -> Result<Value, ToolClientError> {
        let id = request
            .id
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| ProtocolError::UnexpectedMessage("request without numeric id".to_string()))?;
        let method = request.method.clone();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock().await;
            if *self.status.borrow() == SessionStatus::Closed {
                return Err(TransportError::Closed.into());
            }
            pending.insert(id, tx);
        }

        if let Err(e) = self.transport.send(&JsonRpcMessage::from(request)).await {
            self.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(rpc_error))) => Err(ProtocolError::from(rpc_error).into()),
            Ok(Err(_)) => Err(TransportError::Closed.into()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ToolClientError::Timeout {
                    method,
                    id,
                    timeout_ms: timeout.as_millis(),
                })
            }
        }
    }

    /// Flip to closed and drop every waiter. Returns whether this call did it.
    async fn mark_closed(&self) -> bool {
        let mut pending = self.pending.lock().await;
        let previous = self.status.send_replace(SessionStatus::Closed);
        if !pending.is_empty() {
            tracing::debug!(
                "[ToolClient:{}] Failing {} pending request(s)",
                self.transport.label(),
                pending.len()
            );
        }
        pending.clear();
        previous != SessionStatus::Closed
    }

    async fn reply(&self, response: JsonRpcResponse) {
        if let Err(e) = self.transport.send(&JsonRpcMessage::Response(response)).await {
            tracing::debug!("[ToolClient:{}] Failed to reply to host: {}", self.transport.label(), e);
        }
    }
}

/// Background dispatcher: routes responses to waiters by id.
async fn read_loop(inner: Arc<SessionInner>) {
    let label = inner.transport.label().to_string();
    loop {
        match inner.transport.receive().await {
            Ok(JsonRpcMessage::Response(response)) => {
                let Some(id) = response.id.as_ref().and_then(Value::as_u64) else {
                    tracing::warn!("[ToolClient:{}] Response without usable id: {:?}", label, response.error);
                    continue;
                };
                let waiter = inner.pending.lock().await.remove(&id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response.into_result());
                    }
                    None => tracing::warn!("[ToolClient:{}] Response for unknown request id {}", label, id),
                }
            }
            Ok(JsonRpcMessage::Request(request)) => {
                let response = if request.method == METHOD_PING {
                    JsonRpcResponse::success(request.id, json!({}))
                } else {
                    tracing::warn!("[ToolClient:{}] Unsupported host request: {}", label, request.method);
                    JsonRpcResponse::error(
                        request.id,
                        METHOD_NOT_FOUND,
                        format!("Method not found: {}", request.method),
                    )
                };
                inner.reply(response).await;
            }
            Ok(JsonRpcMessage::Notification(note)) => {
                tracing::debug!("[ToolClient:{}] Notification: {}", label, note.method);
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!("[ToolClient:{}] Skipping line: {}", label, e);
            }
            Err(e) => {
                if !inner.transport.is_closed() {
                    tracing::warn!("[ToolClient:{}] Transport failed: {}", label, e);
                }
                break;
            }
        }
    }

    inner.mark_closed().await;
    tracing::debug!("[ToolClient:{}] reader finished", label);
}

fn classify_call_error(tool: &str, err: ToolClientError) -> ToolClientError {
    match err {
        ToolClientError::Protocol(ProtocolError::Rpc { code, message }) if code == TOOL_NOT_FOUND => {
            tracing::debug!("[ToolClient] {}", message);
            InvocationError::UnknownTool(tool.to_string()).into()
        }
        ToolClientError::Protocol(ProtocolError::Rpc { code, message }) if code == INVALID_PARAMS => {
            InvocationError::MalformedArguments {
                tool: tool.to_string(),
                reason: message,
            }
            .into()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::host::ToolHost;
    use crate::tools::vet_market::{vet_market_host, SEARCH_VET_MARKET_DATA, VET_MARKET_OVERVIEW};

    fn serve_in_process(host: ToolHost) -> Transport {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let (r, w) = tokio::io::split(server_io);
            let _ = host.serve(r, w).await;
        });
        let (r, w) = tokio::io::split(client_io);
        Transport::from_io("in-process", r, w)
    }

    fn query(q: &str) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("query".to_string(), Value::String(q.to_string()));
        args
    }

    #[tokio::test]
    async fn test_handshake_discover_invoke() {
        let client = ToolClient::default();
        let session = client
            .connect(serve_in_process(vet_market_host().unwrap()))
            .await
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Ready);
        assert_eq!(session.host_info().unwrap().server_info.name, "Vet Market Researcher");

        let tools = session.discover().await.unwrap();
        assert_eq!(tools[0].name, SEARCH_VET_MARKET_DATA);
        assert_eq!(session.cached_tools().await.unwrap(), tools);

        let result = session.invoke(SEARCH_VET_MARKET_DATA, query("vets")).await.unwrap();
        assert_eq!(result.text(), VET_MARKET_OVERVIEW);
        assert!(result.correlation_id > 0);

        session.close().await;
        assert_eq!(session.status(), SessionStatus::Closed);
    }

    #[tokio::test]
    async fn test_invoke_before_initialize_is_a_state_error() {
        let client = ToolClient::default();
        let session = client.attach(serve_in_process(vet_market_host().unwrap()));

        let err = session.invoke(SEARCH_VET_MARKET_DATA, query("x")).await.unwrap_err();
        assert!(matches!(
            err,
            ToolClientError::State {
                actual: SessionStatus::Uninitialized
            }
        ));
        let err = session.discover().await.unwrap_err();
        assert!(matches!(err, ToolClientError::State { .. }));
        session.close().await;
    }

    #[tokio::test]
    async fn test_invocation_errors_are_classified() {
        let session = ToolClient::default()
            .connect(serve_in_process(vet_market_host().unwrap()))
            .await
            .unwrap();

        let err = session.invoke("no_such_tool", Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolClientError::Invocation(InvocationError::UnknownTool(ref t)) if t == "no_such_tool"));

        let err = session.invoke(SEARCH_VET_MARKET_DATA, Map::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ToolClientError::Invocation(InvocationError::MalformedArguments { .. })
        ));

        // The session survives tool-level errors.
        assert_eq!(session.status(), SessionStatus::Ready);
        session.close().await;
    }

    #[tokio::test]
    async fn test_second_initialize_is_rejected() {
        let session = ToolClient::default()
            .connect(serve_in_process(vet_market_host().unwrap()))
            .await
            .unwrap();
        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, ToolClientError::State { actual: SessionStatus::Ready }));
        session.close().await;
    }

    #[tokio::test]
    async fn test_handshake_timeout_fails_connect() {
        // A peer that never answers.
        let (client_io, _silent_peer) = tokio::io::duplex(1024);
        let (r, w) = tokio::io::split(client_io);
        let client = ToolClient::new(ClientConfig {
            handshake_timeout: Duration::from_millis(50),
            ..ClientConfig::default()
        });

        let err = client.connect(Transport::from_io("silent", r, w)).await.unwrap_err();
        let ToolClientError::Connect(cause) = err else {
            panic!("expected connect error");
        };
        assert!(matches!(*cause, ToolClientError::Timeout { ref method, .. } if method == "initialize"));
    }

    #[tokio::test]
    async fn test_close_twice_is_harmless() {
        let session = ToolClient::default()
            .connect(serve_in_process(vet_market_host().unwrap()))
            .await
            .unwrap();
        session.close().await;
        session.close().await;
        let err = session.invoke(SEARCH_VET_MARKET_DATA, query("x")).await.unwrap_err();
        assert!(matches!(err, ToolClientError::State { actual: SessionStatus::Closed }));
    }
}
