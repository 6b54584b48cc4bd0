//! Error Types

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Tool server could not be reached or the handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Tool-call arguments were not a valid JSON object for the tool
    #[error("Invalid arguments for tool '{name}': {reason}")]
    ToolArgumentParse { name: String, reason: String },

    /// Tool is unknown or its execution failed
    #[error("Tool '{name}' failed: {cause}")]
    ToolInvocation { name: String, cause: String },

    /// Completion ended with a stop reason the loop cannot continue from
    #[error("Unknown stop reason: {stop_reason}")]
    Protocol { stop_reason: String },

    /// Transport failure after the session was established
    #[error("Transport error: {0}")]
    Transport(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    pub fn tool_invocation(name: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::ToolInvocation {
            name: name.into(),
            cause: cause.to_string(),
        }
    }

    pub fn argument_parse(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ToolArgumentParse {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors the tool-call resolver reports back to the model instead of raising
    pub const fn is_recoverable_tool_error(&self) -> bool {
        matches!(
            self,
            Self::ToolArgumentParse { .. } | Self::ToolInvocation { .. }
        )
    }

    /// Errors after which no further query can run on this session
    pub const fn is_session_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_) | Self::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(msg) => format!("Could not connect to the tool server: {msg}"),
            Self::Protocol { stop_reason } => {
                format!("The model stopped for an unsupported reason ('{stop_reason}').")
            }
            Self::Transport(msg) => format!("The tool server connection failed: {msg}"),
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolInvocation { name, cause } => format!("Tool '{name}' failed: {cause}"),
            Self::ToolArgumentParse { name, reason } => {
                format!("Invalid input for tool '{name}': {reason}")
            }
            Self::RateLimited(_) => "You've made too many requests. Please wait a moment.".into(),
            Self::Auth(_) => "Authentication failed. Please check your credentials.".into(),
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}
