//! JSON-RPC 2.0 envelope shared by the agent server and the client
//! transport, plus the A2A error code table.

pub mod client;

pub use client::HttpAgentTransport;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A2A JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    /// Task not found.
    TaskNotFound = -32001,
    /// Task cannot be canceled in its current state.
    TaskNotCancelable = -32002,
    /// Method not found.
    MethodNotFound = -32601,
    /// Invalid request parameters.
    InvalidParams = -32602,
    /// Internal error.
    InternalError = -32603,
    /// Parse error.
    ParseError = -32700,
}

impl RpcErrorCode {
    pub fn code(&self) -> i64 {
        *self as i64
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::TaskNotFound => "Task not found",
            Self::TaskNotCancelable => "Task cannot be canceled",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ParseError => "Parse error",
        }
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(Value::String(uuid::Uuid::new_v4().to_string())),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".into(), id, result: Some(result), error: None }
    }

    pub fn error(id: Option<Value>, code: RpcErrorCode, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: code.code(),
                message: code.message().to_string(),
                data,
            }),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_carries_envelope_fields() {
        let request = JsonRpcRequest::new("send_message", json!({"message": {}}));
        assert_eq!(request.jsonrpc, "2.0");
        assert!(request.id.is_some());
        assert_eq!(request.method, "send_message");
    }

    #[test]
    fn success_response_omits_error() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"ok": true}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["ok"], true);
    }

    #[test]
    fn error_response_omits_result() {
        let response = JsonRpcResponse::error(Some(json!(1)), RpcErrorCode::TaskNotFound, None);
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["code"], -32001);
        assert_eq!(value["error"]["message"], "Task not found");
    }

    #[test]
    fn error_codes_match_protocol() {
        assert_eq!(RpcErrorCode::TaskNotFound.code(), -32001);
        assert_eq!(RpcErrorCode::TaskNotCancelable.code(), -32002);
        assert_eq!(RpcErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(RpcErrorCode::ParseError.code(), -32700);
    }
}
