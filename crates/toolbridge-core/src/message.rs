//! Conversation Messages
//!
//! The message log fed to every completion request. A [`Conversation`] only
//! grows: later messages always happened after earlier ones, and nothing is
//! removed or reordered while a query is being processed.

use serde::{Deserialize, Serialize};

use crate::tool::ToolCallRequest;

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        /// Tool calls requested in this turn (empty for a final answer)
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create a final assistant message
    pub fn assistant(content: Option<String>) -> Self {
        Self::Assistant {
            content,
            tool_calls: Vec::new(),
        }
    }

    /// Create the assistant turn that requested `calls`.
    ///
    /// The content is a human-readable log line per call.
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        let log = calls
            .iter()
            .map(ToolCallRequest::log_line)
            .collect::<Vec<_>>()
            .join("\n");

        Self::Assistant {
            content: Some(log),
            tool_calls: calls,
        }
    }

    /// Create a tool result message
    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub const fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content.as_str())
            }
            Self::Assistant { content, .. } => content.as_deref(),
        }
    }

    /// Tool calls carried by an assistant turn
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }
}

/// Append-only conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Read view passed to completion requests
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Informational "[Calling function ...]" lines, in the order the calls were made
    pub fn tool_call_log(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| !m.tool_calls().is_empty())
            .filter_map(Message::content)
            .flat_map(str::lines)
            .collect()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
