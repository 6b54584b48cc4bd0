//! Tool-Call Resolver
//!
//! Executes the tool calls of one assistant turn and folds each result into
//! the conversation as a `tool` message.

use crate::error::{BridgeError, Result};
use crate::message::{Conversation, Message};
use crate::tool::{ToolCallRequest, ToolDescriptor, ToolRunner, joined_text, validate_arguments};

/// Resolves tool calls against a [`ToolRunner`]
pub struct ToolCallResolver<'a> {
    runner: &'a dyn ToolRunner,
    catalog: &'a [ToolDescriptor],
    validate: bool,
}

impl<'a> ToolCallResolver<'a> {
    /// `catalog` is the tool list advertised for this turn; it supplies the
    /// input schemas arguments are validated against.
    pub const fn new(runner: &'a dyn ToolRunner, catalog: &'a [ToolDescriptor]) -> Self {
        Self {
            runner,
            catalog,
            validate: true,
        }
    }

    /// Enable or disable schema validation of parsed arguments
    pub const fn validate_arguments(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Run `requests` one at a time in provider order, appending one `tool`
    /// message per request.
    ///
    /// Argument and tool failures become the message content; only transport
    /// and connection failures are returned.
    pub async fn resolve(&self, requests: &[ToolCallRequest], conversation: &mut Conversation) -> Result<()> {
        for request in requests {
            let content = match self.invoke(request).await {
                Ok(text) => text,
                Err(e) if e.is_recoverable_tool_error() => {
                    tracing::warn!(tool = %request.name, call_id = %request.id, error = %e, "Tool call failed");
                    format!("Error: {e}")
                }
                Err(e) => return Err(e),
            };

            conversation.push(Message::tool(&request.id, &request.name, content));
        }

        Ok(())
    }

    async fn invoke(&self, request: &ToolCallRequest) -> Result<String> {
        let arguments = request.parse_arguments()?;

        if self.validate {
            if let Some(descriptor) = self.catalog.iter().find(|d| d.name == request.name) {
                validate_arguments(&descriptor.input_schema, &arguments)
                    .map_err(|reason| BridgeError::argument_parse(&request.name, reason))?;
            }
        }

        tracing::info!(tool = %request.name, call_id = %request.id, "Executing tool");
        let blocks = self.runner.call_tool(&request.name, arguments).await?;

        Ok(joined_text(&blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ContentBlock;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;

    /// Records every dispatched call; `boom` always fails
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
        transport_down: bool,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                transport_down: false,
            }
        }
    }

    #[async_trait]
    impl ToolRunner for RecordingRunner {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Vec<ContentBlock>> {
            if self.transport_down {
                return Err(BridgeError::Transport("server closed the connection".into()));
            }
            self.calls.lock().unwrap().push((name.to_string(), arguments));
            match name {
                "boom" => Err(BridgeError::tool_invocation(name, "exploded")),
                "multi" => Ok(vec![
                    ContentBlock::text("first"),
                    ContentBlock::Image {
                        data: String::new(),
                        mime_type: "image/png".into(),
                    },
                    ContentBlock::text("second"),
                ]),
                _ => Ok(vec![ContentBlock::text(format!("{name} ok"))]),
            }
        }
    }

    fn catalog() -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "search",
            "Search things",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        )]
    }

    #[tokio::test]
    async fn test_results_appended_in_request_order() {
        let runner = RecordingRunner::new();
        let catalog = catalog();
        let mut conv = Conversation::new();

        let requests = vec![
            ToolCallRequest::new("c1", "alpha", "{}"),
            ToolCallRequest::new("c2", "multi", ""),
            ToolCallRequest::new("c3", "search", r#"{"query": "rust"}"#),
        ];

        ToolCallResolver::new(&runner, &catalog)
            .resolve(&requests, &mut conv)
            .await
            .unwrap();

        let ids: Vec<_> = conv
            .messages()
            .iter()
            .map(|m| match m {
                Message::Tool { tool_call_id, .. } => tool_call_id.as_str(),
                _ => panic!("only tool messages expected"),
            })
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(conv.messages()[1].content(), Some("first\nsecond"));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].1["query"], "rust");
    }

    #[tokio::test]
    async fn test_malformed_arguments_reported_without_invoking() {
        let runner = RecordingRunner::new();
        let mut conv = Conversation::new();

        let requests = vec![ToolCallRequest::new("c1", "alpha", "{timezone: UTC")];
        ToolCallResolver::new(&runner, &[])
            .resolve(&requests, &mut conv)
            .await
            .unwrap();

        assert!(runner.calls.lock().unwrap().is_empty());
        let content = conv.messages()[0].content().unwrap();
        assert!(content.starts_with("Error: Invalid arguments for tool 'alpha'"));
    }

    #[tokio::test]
    async fn test_schema_violation_reported_in_band() {
        let runner = RecordingRunner::new();
        let catalog = catalog();
        let mut conv = Conversation::new();

        let requests = vec![ToolCallRequest::new("c1", "search", r#"{"query": 7}"#)];
        ToolCallResolver::new(&runner, &catalog)
            .resolve(&requests, &mut conv)
            .await
            .unwrap();

        assert!(runner.calls.lock().unwrap().is_empty());
        assert!(conv.messages()[0].content().unwrap().contains("must be string"));

        // same call goes through once validation is off
        let mut conv = Conversation::new();
        ToolCallResolver::new(&runner, &catalog)
            .validate_arguments(false)
            .resolve(&requests, &mut conv)
            .await
            .unwrap();
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_does_not_stop_later_calls() {
        let runner = RecordingRunner::new();
        let mut conv = Conversation::new();

        let requests = vec![
            ToolCallRequest::new("c1", "boom", "{}"),
            ToolCallRequest::new("c2", "alpha", "{}"),
        ];
        ToolCallResolver::new(&runner, &[])
            .resolve(&requests, &mut conv)
            .await
            .unwrap();

        assert_eq!(conv.len(), 2);
        assert_eq!(
            conv.messages()[0].content(),
            Some("Error: Tool 'boom' failed: exploded")
        );
        assert_eq!(conv.messages()[1].content(), Some("alpha ok"));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mut runner = RecordingRunner::new();
        runner.transport_down = true;
        let mut conv = Conversation::new();

        let requests = vec![ToolCallRequest::new("c1", "alpha", "{}")];
        let err = ToolCallResolver::new(&runner, &[])
            .resolve(&requests, &mut conv)
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(conv.is_empty());
    }
}
