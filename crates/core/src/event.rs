//! Domain events published while a turn runs.
//!
//! The gateway and CLI publish into an [`EventBus`]; anything interested
//! (the CLI's verbose logger, tests) subscribes without the publisher
//! knowing about it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A tool was executed inside a turn
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The model produced the final reply of a turn
    ResponseGenerated {
        session_id: String,
        model: String,
        iterations: usize,
        timestamp: DateTime<Utc>,
    },

    /// A turn was committed to the session store
    TurnCompleted {
        session_id: String,
        history_len: usize,
        tool_calls: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Short name for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::ToolExecuted { .. } => "tool_executed",
            DomainEvent::ResponseGenerated { .. } => "response_generated",
            DomainEvent::TurnCompleted { .. } => "turn_completed",
        }
    }
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
