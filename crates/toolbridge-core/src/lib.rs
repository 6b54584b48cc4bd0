//! # toolbridge-core
//!
//! Tool-orchestration loop between a tool server and a function-calling LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Orchestrator                       │
//! │                                                          │
//! │        Conversation   ToolCallResolver   adapt()         │
//! │                                                          │
//! │           CompletionProvider        ToolRunner           │
//! │          (Strategy)        (MCP session / registry)      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The `CompletionProvider` and `ToolRunner` traits let providers and tool
//! transports be swapped without touching the loop.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod tool;

pub use error::{BridgeError, Result};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
pub use provider::{Completion, CompletionProvider, GenerationOptions, StopReason};
pub use resolver::ToolCallResolver;
pub use tool::{
    ContentBlock, FunctionSchema, Tool, ToolCallRequest, ToolDescriptor, ToolRegistry, ToolRunner,
    adapt,
};
