//! Interactive Driver
//!
//! Line-oriented chat loop: one query per line, each on a fresh
//! conversation, until `quit` or end of input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use toolbridge_core::{Orchestrator, Result};

/// Reads queries and prints answers
pub struct ChatDriver<'a> {
    orchestrator: &'a Orchestrator,
}

impl<'a> ChatDriver<'a> {
    pub const fn new(orchestrator: &'a Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Run until `quit` or end of input.
    ///
    /// Per-query failures are printed and the loop continues; only
    /// session-fatal errors end it early.
    pub async fn run<R, W>(&self, input: R, output: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        output
            .write_all(b"\nMCP Client Started!\nType your queries or 'quit' to exit.\n")
            .await?;

        let mut lines = input.lines();
        loop {
            output.write_all(b"\nQuery: ").await?;
            output.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("quit") {
                break;
            }

            match self.answer(query).await {
                Ok(response) => output.write_all(format!("\n{response}\n").as_bytes()).await?,
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, retryable = e.is_retryable(), "Query failed");
                    output
                        .write_all(format!("\nError: {}\n", e.user_message()).as_bytes())
                        .await?;
                }
            }
        }

        output.flush().await?;
        Ok(())
    }

    /// The tool-call log lines followed by the final answer
    async fn answer(&self, query: &str) -> Result<String> {
        let mut conversation = self.orchestrator.new_conversation();
        let text = self.orchestrator.run(&mut conversation, query).await?;

        let mut parts = conversation.tool_call_log();
        parts.push(&text);
        Ok(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use toolbridge_core::{
        BridgeError, Completion, CompletionProvider, ContentBlock, FunctionSchema, GenerationOptions,
        Message, StopReason, Tool, ToolCallRequest, ToolDescriptor, ToolRegistry, ToolRunner,
    };

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Completion>>>,
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[FunctionSchema],
            _options: &GenerationOptions,
        ) -> Result<Completion> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BridgeError::Provider("script exhausted".into())))
        }
    }

    struct FixedClock;

    #[async_trait]
    impl Tool for FixedClock {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("get_current_time", "Get the current time", json!({"type": "object"}))
        }

        async fn execute(&self, _arguments: &Map<String, Value>) -> Result<Vec<ContentBlock>> {
            Ok(vec![ContentBlock::text("2024-01-01 12:00:00 UTC")])
        }
    }

    /// Runner whose server has gone away mid-session
    struct LostServer;

    #[async_trait]
    impl ToolRunner for LostServer {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Err(BridgeError::Connection("server exited".into()))
        }

        async fn call_tool(&self, _name: &str, _arguments: Map<String, Value>) -> Result<Vec<ContentBlock>> {
            Err(BridgeError::Connection("server exited".into()))
        }
    }

    fn orchestrator(script: Vec<Result<Completion>>, runner: Arc<dyn ToolRunner>) -> Orchestrator {
        let provider = Arc::new(ScriptedProvider {
            script: Mutex::new(script.into()),
        });
        Orchestrator::with_defaults(provider, runner)
    }

    fn clock() -> Arc<dyn ToolRunner> {
        let mut registry = ToolRegistry::new();
        registry.register(FixedClock);
        Arc::new(registry)
    }

    async fn drive(orchestrator: &Orchestrator, input: &str) -> (Result<()>, String) {
        let mut output = Vec::new();
        let result = ChatDriver::new(orchestrator).run(input.as_bytes(), &mut output).await;
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_direct_answer_then_quit() {
        let orchestrator = orchestrator(vec![Ok(Completion::stop("Hi there!"))], clock());

        let (result, output) = drive(&orchestrator, "Hello\nQUIT\nnever asked\n").await;

        result.unwrap();
        assert!(output.starts_with("\nMCP Client Started!\nType your queries or 'quit' to exit.\n"));
        assert!(output.contains("\nQuery: \nHi there!\n"));
        assert_eq!(output.matches("Query: ").count(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_log_printed_before_answer() {
        let call = ToolCallRequest::new("call_1", "get_current_time", r#"{"timezone": "UTC"}"#);
        let orchestrator = orchestrator(
            vec![
                Ok(Completion::tool_calls(vec![call])),
                Ok(Completion::stop("It is 12:00 UTC.")),
            ],
            clock(),
        );

        let (result, output) = drive(&orchestrator, "What time is it?\n").await;

        result.unwrap();
        assert!(output.contains(
            "\n[Calling function get_current_time with args {\"timezone\": \"UTC\"}]\nIt is 12:00 UTC.\n"
        ));
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_errors_reported() {
        let mut unknown = Completion::stop("partial");
        unknown.stop_reason = StopReason::from("length");
        let orchestrator = orchestrator(
            vec![Ok(unknown), Ok(Completion::stop("recovered"))],
            clock(),
        );

        let (result, output) = drive(&orchestrator, "\n   \nfirst\nsecond\n").await;

        result.unwrap();
        assert!(output.contains("\nError: The model stopped for an unsupported reason ('length').\n"));
        assert!(output.contains("\nrecovered\n"));
    }

    #[tokio::test]
    async fn test_provider_failure_does_not_end_session() {
        let orchestrator = orchestrator(
            vec![
                Err(BridgeError::ProviderUnavailable("connection refused".into())),
                Ok(Completion::stop("back online")),
            ],
            clock(),
        );

        let (result, output) = drive(&orchestrator, "one\ntwo\n").await;

        result.unwrap();
        assert!(output.contains("\nError: The AI service is currently unavailable. Please try again.\n"));
        assert!(output.contains("\nback online\n"));
    }

    #[tokio::test]
    async fn test_session_fatal_error_ends_loop() {
        let orchestrator = orchestrator(vec![Ok(Completion::stop("unused"))], Arc::new(LostServer));

        let (result, output) = drive(&orchestrator, "hello\nagain\n").await;

        assert!(matches!(result, Err(BridgeError::Connection(_))));
        assert_eq!(output.matches("Query: ").count(), 1);
    }
}
