//! Orchestration Loop
//!
//! Drives one user query from submission to final answer:
//!
//! ```text
//! Idle ─► AwaitingFirstCompletion ─┬─ stop ──────────────────────────────────► Done
//!                                  ├─ tool_calls ─► ToolPhase ─► AwaitingFollowupCompletion ─► Done
//!                                  └─ other ─► ProtocolError
//! ```
//!
//! One tool round is the default. With `max_tool_rounds > 1` the follow-up
//! completion keeps the tools attached and may request another round.

use std::sync::Arc;

use crate::error::{BridgeError, Result};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, CompletionProvider, GenerationOptions, StopReason};
use crate::resolver::ToolCallResolver;
use crate::tool::{FunctionSchema, ToolRunner, adapt};

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Generation options sent with every completion request
    pub generation: GenerationOptions,

    /// Tool rounds per query before the follow-up answer is taken as final
    pub max_tool_rounds: usize,

    /// Prepended to a fresh conversation when set
    pub system_prompt: Option<String>,

    /// Validate parsed tool arguments against the tool's input schema
    pub validate_arguments: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            max_tool_rounds: 1,
            system_prompt: None,
            validate_arguments: true,
        }
    }
}

/// Phases of one query, used for tracing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitingFirstCompletion,
    ToolPhase,
    AwaitingFollowupCompletion,
    Done,
}

/// Runs queries against a completion provider and a tool runner
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    runner: Arc<dyn ToolRunner>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        runner: Arc<dyn ToolRunner>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            runner,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn CompletionProvider>, runner: Arc<dyn ToolRunner>) -> Self {
        Self::new(provider, runner, OrchestratorConfig::default())
    }

    /// A conversation seeded with the configured system prompt, if any
    pub fn new_conversation(&self) -> Conversation {
        self.config
            .system_prompt
            .as_ref()
            .map_or_else(Conversation::new, Conversation::with_system_prompt)
    }

    /// Process `query` on `conversation` and return the final answer text.
    ///
    /// A null final answer is returned as an empty string. On
    /// [`BridgeError::Protocol`] nothing is appended after the user message
    /// (or after the last completed tool round).
    pub async fn run(&self, conversation: &mut Conversation, query: &str) -> Result<String> {
        conversation.push(Message::user(query));

        let catalog = self.runner.list_tools().await?;
        let schemas = adapt(&catalog);
        tracing::debug!(tools = schemas.len(), phase = ?Phase::AwaitingFirstCompletion, "Requesting completion");

        let mut completion = self.complete(conversation, &schemas).await?;
        let mut rounds = 0;

        loop {
            match completion.stop_reason {
                StopReason::Stop => break,
                StopReason::ToolCalls => {
                    rounds += 1;
                    tracing::debug!(
                        calls = completion.tool_calls.len(),
                        round = rounds,
                        phase = ?Phase::ToolPhase,
                        "Resolving tool calls"
                    );

                    let calls = std::mem::take(&mut completion.tool_calls);
                    conversation.push(Message::assistant_tool_calls(calls.clone()));

                    ToolCallResolver::new(self.runner.as_ref(), &catalog)
                        .validate_arguments(self.config.validate_arguments)
                        .resolve(&calls, conversation)
                        .await?;

                    let more_rounds = rounds < self.config.max_tool_rounds;
                    let tools: &[FunctionSchema] = if more_rounds { &schemas } else { &[] };
                    tracing::debug!(phase = ?Phase::AwaitingFollowupCompletion, "Requesting follow-up completion");

                    completion = self.complete(conversation, tools).await?;

                    // the last follow-up is final whatever its stop reason
                    if !more_rounds {
                        break;
                    }
                }
                StopReason::Other(stop_reason) => {
                    return Err(BridgeError::Protocol { stop_reason });
                }
            }
        }

        tracing::debug!(rounds, phase = ?Phase::Done, "Query complete");
        let text = completion.text;
        conversation.push(Message::assistant(text.clone()));

        Ok(text.unwrap_or_default())
    }

    /// Run with a simple string input (creates a temporary conversation)
    pub async fn ask(&self, query: &str) -> Result<String> {
        let mut conversation = self.new_conversation();
        self.run(&mut conversation, query).await
    }

    async fn complete(&self, conversation: &Conversation, tools: &[FunctionSchema]) -> Result<Completion> {
        let completion = self
            .provider
            .complete(conversation.messages(), tools, &self.config.generation)
            .await?;

        tracing::debug!(
            provider = self.provider.name(),
            stop_reason = %completion.stop_reason,
            tool_calls = completion.tool_calls.len(),
            "Completion received"
        );

        Ok(completion)
    }
}

/// Builder for Orchestrator configuration
#[derive(Default)]
pub struct OrchestratorBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    runner: Option<Arc<dyn ToolRunner>>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub const fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.config.generation.max_tokens = max_tokens;
        self
    }

    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = Some(temp);
        self
    }

    pub const fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.config.max_tool_rounds = rounds;
        self
    }

    pub const fn validate_arguments(mut self, validate: bool) -> Self {
        self.config.validate_arguments = validate;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| BridgeError::Config("Provider is required".into()))?;
        let runner = self
            .runner
            .ok_or_else(|| BridgeError::Config("Tool runner is required".into()))?;

        if self.config.max_tool_rounds == 0 {
            return Err(BridgeError::Config("max_tool_rounds must be at least 1".into()));
        }

        Ok(Orchestrator::new(provider, runner, self.config))
    }
}
