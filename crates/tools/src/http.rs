//! Shared HTTP plumbing for the SaaS tools.
//!
//! Every call ends in either a JSON body or a [`Failure`]. Failures never
//! escape a tool as an `Err`: they are folded into a failed `ToolResult` the
//! model can read, except for bad arguments, which surface as
//! `ToolError::InvalidArguments`.

use ronnyx_core::error::ToolError;
use ronnyx_core::tool::ToolResult;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Why a tool call did not produce a payload.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The upstream API answered with a non-success status.
    #[error("{message} (status {status})")]
    Upstream { status: u16, message: String },

    /// Anything else the model should be told about (missing credentials,
    /// network errors, unparseable bodies).
    #[error("{0}")]
    Message(String),

    /// The model sent arguments the tool cannot use.
    #[error("{0}")]
    Arguments(String),
}

impl Failure {
    pub fn message(msg: impl Into<String>) -> Self {
        Failure::Message(msg.into())
    }

    /// Fold a handler outcome into what `Tool::execute` returns.
    pub fn into_tool_outcome(outcome: Result<Value, Failure>) -> Result<ToolResult, ToolError> {
        match outcome {
            Ok(payload) => Ok(ToolResult::success(payload)),
            Err(Failure::Arguments(msg)) => Err(ToolError::InvalidArguments(msg)),
            Err(Failure::Upstream { status, message }) => {
                Ok(ToolResult::upstream_failure(status, message))
            }
            Err(Failure::Message(msg)) => Ok(ToolResult::failure(msg)),
        }
    }
}

/// A reqwest client bound to one API base URL.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: user_agent.to_string(),
                reason: format!("HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Start a request against `path` (which begins with `/`).
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Send a request and decode the JSON body. Empty bodies decode as `null`.
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, Failure> {
        let response = request
            .send()
            .await
            .map_err(|e| Failure::Message(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Failure::Message(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "Upstream returned error");
            return Err(Failure::Upstream {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Failure::Message(format!("Failed to parse response: {e}")))
    }
}

/// Percent-encode one URL path segment. A `/` inside it is encoded too.
pub fn encode_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Percent-encode a slash-separated path such as a repository file path or
/// a branch name, keeping `/` as the separator.
pub fn encode_path(raw: &str) -> String {
    raw.split('/').map(encode_segment).collect::<Vec<_>>().join("/")
}

/// Pull the human-readable message out of a GitHub/Notion error body,
/// falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
