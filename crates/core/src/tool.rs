//! Tool trait — the abstraction over the assistant's capabilities.
//!
//! A tool wraps one operation against an external service (list GitHub
//! repositories, create a Notion task, ...). Upstream failures are reported
//! inside the [`ToolResult`], never as an `Err`: the agent reads the failure
//! and decides what to tell the user.

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, as sent back to the model
    pub output: String,

    /// Structured payload on success, or the error envelope on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result. The payload's fields are merged next to
    /// `"success": true` in the output envelope.
    pub fn success(payload: serde_json::Value) -> Self {
        Self::envelope(true, payload)
    }

    /// A failed result carrying a human-readable error.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::envelope(false, serde_json::json!({ "error": error.into() }))
    }

    /// A failed result for a non-success HTTP status from an upstream API.
    pub fn upstream_failure(status_code: u16, error: impl Into<String>) -> Self {
        Self::envelope(
            false,
            serde_json::json!({ "status_code": status_code, "error": error.into() }),
        )
    }

    /// The error message of a failed result, if any.
    pub fn error(&self) -> Option<&str> {
        if self.success {
            return None;
        }
        self.data.as_ref()?.get("error")?.as_str()
    }

    fn envelope(success: bool, payload: serde_json::Value) -> Self {
        let mut body = serde_json::Map::new();
        body.insert("success".into(), serde_json::Value::Bool(success));
        match payload {
            serde_json::Value::Object(fields) => body.extend(fields),
            serde_json::Value::Null => {}
            other => {
                body.insert("result".into(), other);
            }
        }
        let data = serde_json::Value::Object(body);

        Self {
            call_id: String::new(),
            success,
            output: data.to_string(),
            data: Some(data),
        }
    }
}

/// The core Tool trait.
///
/// Tools are registered in the [`ToolRegistry`] and made available to the
/// reasoning graph.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "github_list_repos").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// An ordered registry of available tools.
///
/// Registration order is the order the model sees the tools in, so the
/// registry keeps a `Vec` and an index by name rather than a bare map.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&pos| self.tools[pos].as_ref())
    }

    /// All tool definitions in registration order (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call. The returned result carries the call's ID.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
