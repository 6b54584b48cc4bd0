//! Completion Provider Strategy
//!
//! Common interface for function-calling completion backends, so the
//! orchestration loop works with any OpenAI-compatible server (or a fake in
//! tests) without code changes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolbridge_core::provider::{CompletionProvider, GenerationOptions};
//!
//! let provider = OpenAiProvider::from_config(OpenAiConfig::default())?;
//! let completion = provider.complete(&messages, &schemas, &options).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::{FunctionSchema, ToolCallRequest};

/// Configuration for completion requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "qwen2.5-7b-instruct-1m", "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling; provider default when unset
    #[serde(default)]
    pub temperature: Option<f32>,
}

pub const DEFAULT_MODEL: &str = "qwen2.5-7b-instruct-1m";

fn default_max_tokens() -> Option<u32> {
    Some(1000)
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// Why a completion ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    /// The model requested tool execution
    ToolCalls,
    /// The model produced its final text
    Stop,
    /// Any other provider value ("length", "content_filter", ...)
    Other(String),
}

impl From<&str> for StopReason {
    fn from(value: &str) -> Self {
        match value {
            "tool_calls" => Self::ToolCalls,
            "stop" => Self::Stop,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for StopReason {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<StopReason> for String {
    fn from(reason: StopReason) -> Self {
        reason.to_string()
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolCalls => write!(f, "tool_calls"),
            Self::Stop => write!(f, "stop"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Response from one completion request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    /// Finish classification
    pub stop_reason: StopReason,

    /// Requested tool calls, in provider order
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Generated text, if any
    pub text: Option<String>,

    /// Model that generated this response
    #[serde(default)]
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

impl Completion {
    /// A final-answer completion
    pub fn stop(text: impl Into<String>) -> Self {
        Self {
            stop_reason: StopReason::Stop,
            tool_calls: Vec::new(),
            text: Some(text.into()),
            model: String::new(),
            usage: None,
        }
    }

    /// A completion requesting `calls`
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            stop_reason: StopReason::ToolCalls,
            tool_calls: calls,
            text: None,
            model: String::new(),
            usage: None,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Strategy trait for completion providers
///
/// Implement this trait to add support for new LLM backends.
/// The orchestration loop works exclusively through this interface.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logs (e.g., "openai")
    fn name(&self) -> &str;

    /// Submit the conversation and the tools the model may call.
    ///
    /// An empty `tools` slice means the request carries no tools at all.
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[FunctionSchema],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// Check if the provider is reachable and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
