//! MCP wire types
//!
//! Newline-delimited JSON-RPC 2.0 messages and the handful of MCP results
//! this client consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolbridge_core::{ContentBlock, ToolDescriptor};

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP revision sent in the `initialize` request
pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub const fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Reply to a request the server sent us
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub const fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }
}

pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Anything the server can write to its stdout.
///
/// Variant order matters: a server request carries both `id` and `method`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Request {
        id: Value,
        method: String,
        #[serde(default)]
        params: Option<Value>,
    },
    Response {
        id: Value,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<JsonRpcError>,
    },
    Notification {
        method: String,
        #[serde(default)]
        params: Option<Value>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(rename = "serverInfo", default)]
    pub server_info: Implementation,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = JsonRpcRequest::new(7, "tools/list", None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
    }

    #[test]
    fn test_incoming_message_classification() {
        let response: IncomingMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": {"tools": []}})).unwrap();
        assert!(matches!(response, IncomingMessage::Response { result: Some(_), error: None, .. }));

        let error: IncomingMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0", "id": 2, "error": {"code": -32601, "message": "Method not found"}
        }))
        .unwrap();
        assert!(matches!(error, IncomingMessage::Response { error: Some(ref e), .. } if e.code == -32601));

        let request: IncomingMessage =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 9, "method": "ping"})).unwrap();
        assert!(matches!(request, IncomingMessage::Request { ref method, .. } if method == "ping"));

        let notification: IncomingMessage = serde_json::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/tools/list_changed"
        }))
        .unwrap();
        assert!(matches!(notification, IncomingMessage::Notification { .. }));
    }

    #[test]
    fn test_call_tool_result_parsing() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "2024-01-01 12:00:00 UTC"}],
            "isError": false
        }))
        .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].as_text(), Some("2024-01-01 12:00:00 UTC"));
    }
}
