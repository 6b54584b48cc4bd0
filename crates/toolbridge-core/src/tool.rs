//! Tool System
//!
//! Tool descriptors as advertised by a tool server, the function-calling
//! schemas handed to the model, and the [`ToolRunner`] capability the
//! orchestration loop invokes tools through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// A callable tool as declared by the tool server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier within one session
    pub name: String,

    /// Human-readable description (shown to the model)
    #[serde(default)]
    pub description: String,

    /// JSON Schema of the arguments object
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Function-calling schema attached to a completion request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl FunctionSchema {
    /// Convert to the OpenAI `tools` entry format
    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

impl From<&ToolDescriptor> for FunctionSchema {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.input_schema.clone(),
        }
    }
}

/// Map tool descriptors to function-calling schemas, preserving order.
///
/// Schemas are passed through untouched; a malformed `inputSchema` is left
/// for the provider to reject.
pub fn adapt(descriptors: &[ToolDescriptor]) -> Vec<FunctionSchema> {
    descriptors.iter().map(FunctionSchema::from).collect()
}

/// Tool call request from the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call ID, echoed back on the tool message
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Arguments exactly as the provider sent them
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, raw_arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }

    /// Parse the raw arguments as a JSON object.
    ///
    /// Blank text is an empty object; anything that is not a JSON object is an error.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>> {
        let raw = self.raw_arguments.trim();
        if raw.is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(BridgeError::argument_parse(
                &self.name,
                format!("expected a JSON object, got {}", json_type_name(&other)),
            )),
            Err(e) => Err(BridgeError::argument_parse(&self.name, e)),
        }
    }

    /// Transcript line recorded before the call is dispatched
    pub fn log_line(&self) -> String {
        format!("[Calling function {} with args {}]", self.name, self.raw_arguments)
    }
}

/// One block of a tool result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        data: String,
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Audio {
        #[serde(default)]
        data: String,
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        #[serde(default)]
        resource: Value,
    },
    /// Any block kind this crate does not know about
    #[serde(other)]
    Unsupported,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// Text of all `text` blocks joined by newlines; other kinds are skipped
pub fn joined_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Capability to discover and invoke tools.
///
/// Implemented by the MCP session and by the in-process [`ToolRegistry`].
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Current tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool by name.
    ///
    /// Unknown names and failing tools are reported as
    /// [`BridgeError::ToolInvocation`].
    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Vec<ContentBlock>>;
}

/// Check `arguments` against the subset of JSON Schema tool servers
/// actually emit: `required`, per-property `type`, and
/// `additionalProperties: false`.
pub fn validate_arguments(schema: &Value, arguments: &Map<String, Value>) -> std::result::Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(name) {
                return Err(format!("Missing required parameter: {name}"));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);

    for (key, value) in arguments {
        let Some(property) = properties.and_then(|p| p.get(key)) else {
            if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                return Err(format!("Unexpected parameter: {key}"));
            }
            continue;
        };

        let allowed: Vec<&str> = match property.get("type") {
            Some(Value::String(t)) => vec![t.as_str()],
            Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };

        if !allowed.is_empty() && !allowed.iter().any(|t| matches_json_type(t, value)) {
            return Err(format!(
                "Parameter '{key}' must be {}, got {}",
                allowed.join(" or "),
                json_type_name(value)
            ));
        }
    }

    Ok(())
}

fn matches_json_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// In-process tools
// ============================================================================

/// Tool trait - implement to serve a tool without a separate server process
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared name, description and input schema
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute the tool with parsed arguments
    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Vec<ContentBlock>>;
}

/// Registry of in-process tools, listed in registration order
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        if let Some(&pos) = self.index.get(&name) {
            self.tools[pos] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&pos| Arc::clone(&self.tools[pos]))
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.descriptor().name).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolRunner for ToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.iter().map(|t| t.descriptor()).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<Vec<ContentBlock>> {
        let tool = self
            .get(name)
            .ok_or_else(|| BridgeError::tool_invocation(name, "unknown tool"))?;

        tool.execute(&arguments).await.map_err(|e| match e {
            e @ BridgeError::ToolInvocation { .. } => e,
            other => BridgeError::tool_invocation(name, other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("{name} tool"), json!({"type": "object", "properties": {}}))
    }

    #[test]
    fn test_adapt_preserves_order_and_fields() {
        let descriptors = vec![descriptor("b"), descriptor("a"), descriptor("c")];
        let schemas = adapt(&descriptors);

        assert_eq!(schemas.len(), descriptors.len());
        for (schema, descriptor) in schemas.iter().zip(&descriptors) {
            assert_eq!(schema.name, descriptor.name);
            assert_eq!(schema.description, descriptor.description);
            assert_eq!(schema.parameters, descriptor.input_schema);
        }
        assert!(adapt(&[]).is_empty());
    }

    #[test]
    fn test_openai_format_wraps_function() {
        let schema = FunctionSchema::from(&descriptor("get_current_time"));
        let value = schema.to_openai_format();

        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_current_time");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_descriptor_from_mcp_json() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "get_current_time",
            "inputSchema": {"type": "object", "properties": {"timezone": {"type": "string"}}}
        }))
        .unwrap();

        assert_eq!(descriptor.description, "");
        assert_eq!(descriptor.input_schema["properties"]["timezone"]["type"], "string");
    }

    #[test]
    fn test_parse_arguments() {
        let call = ToolCallRequest::new("1", "clock", r#"{"timezone": "UTC"}"#);
        assert_eq!(call.parse_arguments().unwrap()["timezone"], "UTC");

        let call = ToolCallRequest::new("1", "clock", "  ");
        assert!(call.parse_arguments().unwrap().is_empty());

        let call = ToolCallRequest::new("1", "clock", "{'timezone': 'UTC'}");
        assert!(matches!(
            call.parse_arguments(),
            Err(BridgeError::ToolArgumentParse { .. })
        ));

        let call = ToolCallRequest::new("1", "clock", "[1, 2]");
        let err = call.parse_arguments().unwrap_err();
        assert!(err.to_string().contains("expected a JSON object, got array"));
    }

    #[test]
    fn test_content_blocks_from_mcp_json() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "text", "text": "one"},
            {"type": "image", "data": "aGk=", "mimeType": "image/png"},
            {"type": "resource_link", "uri": "file:///tmp/x"},
            {"type": "text", "text": "two"}
        ]))
        .unwrap();

        assert_eq!(blocks[2], ContentBlock::Unsupported);
        assert_eq!(joined_text(&blocks), "one\ntwo");
        assert_eq!(joined_text(&blocks[1..3]), "");
    }

    #[test]
    fn test_validate_arguments() {
        let schema = json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string"},
                "precision": {"type": ["integer", "null"]}
            },
            "required": ["expression"],
            "additionalProperties": false
        });

        let ok = json!({"expression": "2 + 2", "precision": 3});
        assert!(validate_arguments(&schema, ok.as_object().unwrap()).is_ok());

        let missing = json!({"precision": 3});
        assert_eq!(
            validate_arguments(&schema, missing.as_object().unwrap()).unwrap_err(),
            "Missing required parameter: expression"
        );

        let wrong_type = json!({"expression": 4});
        assert!(validate_arguments(&schema, wrong_type.as_object().unwrap())
            .unwrap_err()
            .contains("must be string"));

        let extra = json!({"expression": "1", "verbose": true});
        assert!(validate_arguments(&schema, extra.as_object().unwrap()).is_err());

        // permissive schemas accept anything
        assert!(validate_arguments(&json!({}), extra.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_integer_accepts_integral_floats() {
        let schema = json!({"type": "object", "properties": {"count": {"type": "integer"}}});

        let whole = json!({"count": 3.0});
        assert!(validate_arguments(&schema, whole.as_object().unwrap()).is_ok());

        let fractional = json!({"count": 3.5});
        assert!(validate_arguments(&schema, fractional.as_object().unwrap())
            .unwrap_err()
            .contains("must be integer"));
    }

    /// Echoes `text`; fails on `fail`
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new(
                "echo",
                "Echo the given text",
                json!({"type": "object", "properties": {"text": {"type": "string"}}}),
            )
        }

        async fn execute(&self, arguments: &Map<String, Value>) -> Result<Vec<ContentBlock>> {
            match arguments.get("text").and_then(Value::as_str) {
                Some("fail") => Err(BridgeError::Other("echo refused".into())),
                Some(text) => Ok(vec![ContentBlock::text(text)]),
                None => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test]
    async fn test_tool_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("unknown").is_none());

        let listed = registry.list_tools().await.unwrap();
        assert_eq!(listed[0].name, "echo");

        let mut args = Map::new();
        args.insert("text".into(), json!("Asia/Shanghai"));
        let result = registry.call_tool("echo", args).await.unwrap();
        assert_eq!(joined_text(&result), "Asia/Shanghai");

        let mut args = Map::new();
        args.insert("text".into(), json!("fail"));
        let err = registry.call_tool("echo", args).await.unwrap_err();
        assert!(matches!(err, BridgeError::ToolInvocation { ref name, ref cause } if name == "echo" && cause == "echo refused"));

        let err = registry.call_tool("unknown", Map::new()).await.unwrap_err();
        assert!(matches!(err, BridgeError::ToolInvocation { ref name, .. } if name == "unknown"));
    }
}
