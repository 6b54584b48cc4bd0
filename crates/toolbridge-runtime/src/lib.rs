//! # toolbridge-runtime
//!
//! Completion providers for the toolbridge orchestrator.
//!
//! ## Providers
//!
//! - **OpenAI-compatible** (default): any `/chat/completions` server with
//!   function calling, LM Studio on localhost out of the box
//!
//! ## Usage
//!
//! ```rust,ignore
//! use toolbridge_runtime::openai::{OpenAiConfig, OpenAiProvider};
//!
//! let provider = OpenAiProvider::from_config(OpenAiConfig::default())?;
//! let orchestrator = OrchestratorBuilder::new()
//!     .provider(Arc::new(provider))
//!     .runner(Arc::new(session))
//!     .build()?;
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use toolbridge_core::{
    BridgeError, Completion, CompletionProvider, GenerationOptions, Message, Orchestrator, Result,
    StopReason,
};
