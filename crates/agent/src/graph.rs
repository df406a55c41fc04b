//! The reasoning graph: an `Agent` step and a `Tool` step in a loop.
//!
//! ```text
//!   Agent --tool request--> Tool
//!     ^                      |
//!     +----------------------+
//!   Agent --answer--> Done
//! ```
//!
//! The graph is stateless between runs. Each run receives the full session
//! history, prepends the system prompt, and works on a private transcript.

use crate::prompts::{FALLBACK_REPLY, SYSTEM_PROMPT};
use async_trait::async_trait;
use chrono::Utc;
use ronnyx_config::LlmConfig;
use ronnyx_core::error::{ProviderError, ToolError};
use ronnyx_core::event::{DomainEvent, EventBus};
use ronnyx_core::message::{Message, MessageToolCall};
use ronnyx_core::provider::{Provider, ProviderRequest, ToolDefinition};
use ronnyx_core::tool::{ToolCall, ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the agent step decided.
#[derive(Debug, Clone)]
pub enum Decision {
    /// A final assistant message for the user.
    Answer(Message),
    /// An assistant message carrying one or more tool calls.
    ToolRequest(Message),
}

/// Decides the next step given the conversation so far.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Model label used in logs and events.
    fn model(&self) -> &str;

    /// `history` starts with the system prompt.
    async fn decide(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Decision, ProviderError>;
}

/// Runs the tool calls the agent asks for.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError>;
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::definitions(self)
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        ToolRegistry::execute(self, call).await
    }
}

/// A [`Reasoner`] backed by a chat-completions [`Provider`].
pub struct ProviderReasoner {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ProviderReasoner {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Model, temperature and token limit taken from `[llm]`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &LlmConfig) -> Self {
        let reasoner = Self::new(provider, &config.model).with_temperature(config.temperature);
        match config.max_tokens {
            Some(max) => reasoner.with_max_tokens(max),
            None => reasoner,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

#[async_trait]
impl Reasoner for ProviderReasoner {
    fn model(&self) -> &str {
        &self.model
    }

    async fn decide(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Decision, ProviderError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: history.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.to_vec(),
        };

        let response = self.provider.complete(request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                provider = self.provider.name(),
                model = %response.model,
                total_tokens = usage.total_tokens,
                "Completion received"
            );
        }

        let message = response.message;
        Ok(if message.requests_tools() {
            Decision::ToolRequest(message)
        } else {
            Decision::Answer(message)
        })
    }
}

/// The result of one graph run.
#[derive(Debug, Clone)]
pub struct GraphOutcome {
    /// The final assistant message.
    pub reply: Message,
    /// Input history plus everything produced during the run, ending with
    /// `reply`. The system prompt is not included.
    pub transcript: Vec<Message>,
    /// Number of agent steps taken.
    pub iterations: usize,
    /// Number of tool calls executed.
    pub tool_calls: usize,
}

enum State {
    Agent,
    Tool(Message),
    Done(Message),
}

/// The two-node reasoning graph.
pub struct AgentGraph {
    reasoner: Arc<dyn Reasoner>,
    tools: Arc<dyn ToolExecutor>,
    max_iterations: usize,
    events: Option<Arc<EventBus>>,
}

impl AgentGraph {
    pub fn new(reasoner: Arc<dyn Reasoner>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            reasoner,
            tools,
            max_iterations: 25,
            events: None,
        }
    }

    /// Upper bound on agent steps per run. Zero is treated as one.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    /// Run the graph over `history` until the agent answers.
    ///
    /// Only a reasoner failure ends the run with an error; tool failures
    /// are fed back to the agent as tool-result messages.
    pub async fn run(
        &self,
        session_id: &str,
        history: &[Message],
    ) -> Result<GraphOutcome, ProviderError> {
        let definitions = self.tools.definitions();
        let mut transcript = Vec::with_capacity(history.len() + 2);
        transcript.push(Message::system(SYSTEM_PROMPT));
        transcript.extend_from_slice(history);

        let mut iterations = 0;
        let mut tool_calls = 0;
        let mut state = State::Agent;

        let reply = loop {
            state = match state {
                State::Agent => {
                    if iterations >= self.max_iterations {
                        warn!(
                            session_id,
                            iterations, "Max agent iterations reached, giving up on the turn"
                        );
                        State::Done(Message::assistant(FALLBACK_REPLY))
                    } else {
                        iterations += 1;
                        debug!(session_id, iteration = iterations, "Agent step");
                        match self.reasoner.decide(&transcript, &definitions).await? {
                            Decision::Answer(message) => State::Done(message),
                            Decision::ToolRequest(message) => State::Tool(message),
                        }
                    }
                }

                State::Tool(request) => {
                    let calls = request.tool_calls.clone();
                    transcript.push(request);
                    for call in &calls {
                        let result = self.execute_call(session_id, call).await;
                        transcript.push(result);
                        tool_calls += 1;
                    }
                    State::Agent
                }

                State::Done(reply) => break reply,
            };
        };

        self.publish(DomainEvent::ResponseGenerated {
            session_id: session_id.to_string(),
            model: self.reasoner.model().to_string(),
            iterations,
            timestamp: Utc::now(),
        });
        info!(session_id, iterations, tool_calls, "Turn answered");

        transcript.push(reply.clone());
        transcript.remove(0);

        Ok(GraphOutcome {
            reply,
            transcript,
            iterations,
            tool_calls,
        })
    }

    /// Execute one requested call and turn the outcome into a tool message.
    async fn execute_call(&self, session_id: &str, requested: &MessageToolCall) -> Message {
        let start = Instant::now();
        let outcome = match parse_arguments(&requested.arguments) {
            Ok(arguments) => {
                let call = ToolCall {
                    id: requested.id.clone(),
                    name: requested.name.clone(),
                    arguments,
                };
                self.tools.execute(&call).await
            }
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, content) = match outcome {
            Ok(result) => {
                debug!(session_id, tool = %requested.name, success = result.success, duration_ms, "Tool executed");
                (result.success, result.output)
            }
            Err(e) => {
                warn!(session_id, tool = %requested.name, error = %e, "Tool call rejected");
                (false, format!("Error: {e}"))
            }
        };

        self.publish(DomainEvent::ToolExecuted {
            session_id: session_id.to_string(),
            tool_name: requested.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        Message::tool_result(&requested.id, content)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Tool arguments arrive as a JSON string. An empty string means `{}`.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))
}
