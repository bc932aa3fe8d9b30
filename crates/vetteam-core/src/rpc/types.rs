//! JSON-RPC 2.0 protocol types.
//!
//! Shared by the tool host and the tool client. Nothing here knows about
//! pipes or processes; framing lives in `transport::framing`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request object. `id == None` makes it a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echoed from the request; `null` when the request could not be parsed.
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// Application-defined error codes (server range: -32000 to -32099)
pub const TOOL_NOT_FOUND: i64 = -32001;
pub const NOT_INITIALIZED: i64 = -32002;

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(Value::from(id)),
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.as_ref().map_or(true, Value::is_null)
    }
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Build an error response with additional data.
    pub fn error_with_data(
        id: Option<Value>,
        code: i64,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }

    /// Split into the Rust-side outcome.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(err),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// Any message that can appear on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcRequest),
}

impl JsonRpcMessage {
    /// Classify a decoded JSON value.
    ///
    /// `id` + (`result` | `error`) is a response, `id` + `method` a request,
    /// `method` alone a notification.
    pub fn from_value(value: Value) -> Result<Self, String> {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").and_then(Value::as_str).is_some();
        let is_response = value.get("result").is_some() || value.get("error").is_some();

        if is_response && !has_method {
            return serde_json::from_value(value)
                .map(JsonRpcMessage::Response)
                .map_err(|e| format!("invalid response: {}", e));
        }
        if has_method {
            let request: JsonRpcRequest = serde_json::from_value(value)
                .map_err(|e| format!("invalid request: {}", e))?;
            return Ok(if has_id {
                JsonRpcMessage::Request(request)
            } else {
                JsonRpcMessage::Notification(request)
            });
        }
        Err("neither a request, a response nor a notification".to_string())
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request(req) | JsonRpcMessage::Notification(req) => {
                Some(req.method.as_str())
            }
            JsonRpcMessage::Response(_) => None,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(req: JsonRpcRequest) -> Self {
        if req.is_notification() {
            JsonRpcMessage::Notification(req)
        } else {
            JsonRpcMessage::Request(req)
        }
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(resp: JsonRpcResponse) -> Self {
        JsonRpcMessage::Response(resp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_messages() {
        let resp = JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 3, "result": {}})).unwrap();
        assert!(matches!(resp, JsonRpcMessage::Response(_)));

        let req = JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).unwrap();
        assert!(matches!(req, JsonRpcMessage::Request(_)));

        let note = JsonRpcMessage::from_value(
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .unwrap();
        assert!(matches!(note, JsonRpcMessage::Notification(_)));

        assert!(JsonRpcMessage::from_value(json!({"jsonrpc": "2.0", "id": 1})).is_err());
    }

    #[test]
    fn test_error_response_into_result() {
        let resp = JsonRpcResponse::error(Some(json!(7)), TOOL_NOT_FOUND, "Tool not found: x");
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, TOOL_NOT_FOUND);
        assert_eq!(err.message, "Tool not found: x");
    }

    #[test]
    fn test_notification_has_no_id_on_the_wire() {
        let note = JsonRpcRequest::notification("notifications/initialized", None);
        let encoded = serde_json::to_value(&note).unwrap();
        assert!(encoded.get("id").is_none());
        assert!(encoded.get("params").is_none());
    }
}
