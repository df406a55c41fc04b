//! # Ronnyx Core
//!
//! Domain types, traits, and error definitions for the Ronnyx assistant.
//! Every other crate depends inward on this one.
//!
//! ## Seams
//!
//! - [`Provider`] — the opaque language model that either answers or asks for tools
//! - [`Tool`] — one operation against an external service
//! - [`SessionStore`] — where per-session conversation history lives
//!
//! Implementations live in their own crates so they can be swapped through
//! configuration and replaced by stubs in tests.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use session::{EmptySessionId, SessionId, SessionStore, SessionSummary};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
