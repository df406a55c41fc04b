//! The reasoning graph at the heart of Ronnyx.
//!
//! A turn alternates between two nodes:
//!
//! 1. **Agent**: the model sees the system prompt plus the conversation and
//!    either answers or asks for tools
//! 2. **Tool**: each requested call runs in order and its result is appended
//!
//! The loop ends when the model answers, or when the iteration bound is hit.

pub mod graph;
pub mod prompts;

pub use graph::{AgentGraph, Decision, GraphOutcome, ProviderReasoner, Reasoner, ToolExecutor};
pub use prompts::SYSTEM_PROMPT;
