//! Error Types for the MCP client

use std::time::Duration;

use thiserror::Error;
use toolbridge_core::BridgeError;

use crate::protocol::JsonRpcError;

pub type Result<T> = std::result::Result<T, McpError>;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Server error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("Connection closed by server")]
    Closed,

    #[error("Request '{method}' timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Server script must be a .py or .js file: {0}")]
    UnsupportedTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<McpError> for BridgeError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::UnsupportedTarget(_) => Self::Connection(err.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}
