//! OpenAI-compatible Completion Provider
//!
//! Implementation of `CompletionProvider` for any server exposing the
//! `/chat/completions` endpoint with function calling (LM Studio, vLLM,
//! llama.cpp server, OpenAI itself).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use toolbridge_core::{
    error::{BridgeError, Result},
    message::Message,
    provider::{Completion, CompletionProvider, GenerationOptions, StopReason, TokenUsage},
    tool::{FunctionSchema, ToolCallRequest},
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_API_KEY: &str = "lm-studio";

/// OpenAI-compatible provider configuration
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// API base URL, up to and including the version segment
    pub base_url: String,

    /// Bearer token; local servers accept any value
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: DEFAULT_API_KEY.into(),
            timeout_secs: 120,
        }
    }
}

/// Chat-completions provider over HTTP
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    /// Create from configuration
    pub fn from_config(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub const fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert conversation messages to the chat-completions format
    fn convert_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m {
                Message::System { content } => json!({"role": "system", "content": content}),
                Message::User { content } => json!({"role": "user", "content": content}),
                Message::Assistant { content, tool_calls } => {
                    let mut msg = json!({"role": "assistant", "content": content});
                    if !tool_calls.is_empty() {
                        msg["tool_calls"] = tool_calls
                            .iter()
                            .map(|tc| {
                                json!({
                                    "id": tc.id,
                                    "type": "function",
                                    "function": {"name": tc.name, "arguments": tc.raw_arguments}
                                })
                            })
                            .collect();
                    }
                    msg
                }
                Message::Tool {
                    tool_call_id,
                    name,
                    content,
                } => json!({
                    "role": "tool",
                    "tool_call_id": tool_call_id,
                    "name": name,
                    "content": content,
                }),
            })
            .collect()
    }

    /// Build the request body; tools are omitted entirely when empty
    fn build_request(messages: &[Message], tools: &[FunctionSchema], options: &GenerationOptions) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), json!(options.model));
        body.insert("messages".into(), Value::Array(Self::convert_messages(messages)));

        if !tools.is_empty() {
            body.insert(
                "tools".into(),
                tools.iter().map(FunctionSchema::to_openai_format).collect(),
            );
        }
        if let Some(max_tokens) = options.max_tokens {
            body.insert("max_tokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            body.insert("temperature".into(), json!(temperature));
        }

        Value::Object(body)
    }

    /// Convert a chat-completions response to a completion.
    ///
    /// A response carrying tool calls is a tool-call completion whatever its
    /// `finish_reason` says.
    fn parse_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::Provider("response contained no choices".into()))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                let id = tc
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let arguments = match tc.function.arguments {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(raw)) => raw,
                    Some(other) => other.to_string(),
                };
                ToolCallRequest::new(id, tc.function.name, arguments)
            })
            .collect();

        let stop_reason = if tool_calls.is_empty() {
            choice
                .finish_reason
                .map_or_else(|| StopReason::Other("null".into()), StopReason::from)
        } else {
            StopReason::ToolCalls
        };

        Ok(Completion {
            stop_reason,
            tool_calls,
            text: choice.message.content,
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str) -> BridgeError {
    let detail = format!("{status}: {}", body.chars().take(500).collect::<String>());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BridgeError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => BridgeError::RateLimited(detail),
        s if s.is_server_error() => BridgeError::ProviderUnavailable(detail),
        _ => BridgeError::Provider(detail),
    }
}

fn request_error(e: &reqwest::Error) -> BridgeError {
    if e.is_connect() || e.is_timeout() {
        BridgeError::ProviderUnavailable(e.to_string())
    } else {
        BridgeError::Provider(e.to_string())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[FunctionSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let body = Self::build_request(messages, tools, options);
        tracing::debug!(
            model = %options.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| request_error(&e))?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| BridgeError::Provider(format!("malformed completion response: {e}")))?;

        Self::parse_completion(parsed, &options.model)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Completion provider health check failed: {}", e);
                Ok(false)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
