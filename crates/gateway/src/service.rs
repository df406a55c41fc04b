//! `ChatService`: one conversational turn from session load to commit.

use ronnyx_agent::{AgentGraph, ProviderReasoner};
use ronnyx_config::AppConfig;
use ronnyx_core::error::{ProviderError, SessionError};
use ronnyx_core::event::{DomainEvent, EventBus};
use ronnyx_core::message::Message;
use ronnyx_core::provider::ToolDefinition;
use ronnyx_core::session::{EmptySessionId, SessionId, SessionStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Why a turn failed. Nothing is committed to the session when it does.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    InvalidSession(#[from] EmptySessionId),

    #[error("Reasoning engine failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Session store failed: {0}")]
    Store(#[from] SessionError),

    #[error("Turn timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// The reply to one turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub session_id: SessionId,
    pub reply: String,
    pub history_len: usize,
    pub iterations: usize,
    pub tool_calls: usize,
}

/// Ties the session store to the reasoning graph.
///
/// Turns on the same session are serialized; different sessions run
/// concurrently.
pub struct ChatService {
    graph: Arc<AgentGraph>,
    store: Arc<dyn SessionStore>,
    events: Option<Arc<EventBus>>,
    turn_timeout: Option<Duration>,
    locks: std::sync::Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatService {
    pub fn new(graph: Arc<AgentGraph>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            graph,
            store,
            events: None,
            turn_timeout: None,
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Build the provider, tool registry, session store and graph described
    /// by `config`.
    pub async fn from_config(
        config: &AppConfig,
        events: Arc<EventBus>,
    ) -> ronnyx_core::Result<Self> {
        let provider = ronnyx_providers::build_from_config(config)?;
        let tools = Arc::new(ronnyx_tools::default_registry(config)?);
        let store = ronnyx_memory::open_store(&config.sessions).await?;

        info!(
            provider = provider.name(),
            model = %config.llm.model,
            tools = tools.len(),
            store = store.name(),
            "Chat service ready"
        );

        let reasoner = Arc::new(ProviderReasoner::from_config(provider, &config.llm));
        let graph = AgentGraph::new(reasoner, tools)
            .with_max_iterations(config.agent.max_iterations)
            .with_event_bus(events.clone());

        let mut service = Self::new(Arc::new(graph), store).with_event_bus(events);
        if config.agent.turn_timeout_secs > 0 {
            let timeout = Duration::from_secs(config.agent.turn_timeout_secs);
            service = service.with_turn_timeout(timeout);
        }
        Ok(service)
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.graph.tool_definitions()
    }

    /// Stored history of a session, `None` when it has never been used.
    pub async fn history(&self, session_id: &str) -> Result<Option<Vec<Message>>, ChatError> {
        let id = SessionId::parse(session_id)?;
        Ok(self.store.load(&id).await?)
    }

    /// Run one turn: load the history (empty for a new session), append
    /// the user message, run the graph, then commit the user message and
    /// the final reply together.
    pub async fn chat(
        &self,
        session_id: &str,
        message: impl Into<String>,
    ) -> Result<TurnReply, ChatError> {
        let id = SessionId::parse(session_id)?;
        let lock = self.session_lock(&id);
        let outcome = {
            let _guard = lock.lock().await;
            self.turn(&id, Message::user(message)).await
        };
        drop(lock);
        self.prune_locks();
        outcome
    }

    async fn turn(&self, id: &SessionId, user: Message) -> Result<TurnReply, ChatError> {
        let started = Instant::now();
        let mut history = self.store.history(id).await?;
        info!(session_id = %id, history = history.len(), "Turn started");
        history.push(user.clone());

        let run = self.graph.run(id.as_str(), &history);
        let outcome = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                warn!(session_id = %id, "Turn timed out");
                ChatError::Timeout(limit)
            })??,
            None => run.await?,
        };

        let reply = outcome.reply.content.clone();
        self.store.append(id, vec![user, outcome.reply]).await?;

        let history_len = history.len() + 1;
        let duration_ms = started.elapsed().as_millis() as u64;
        if let Some(events) = &self.events {
            events.publish(DomainEvent::TurnCompleted {
                session_id: id.to_string(),
                history_len,
                tool_calls: outcome.tool_calls,
                duration_ms,
                timestamp: chrono::Utc::now(),
            });
        }
        info!(session_id = %id, history_len, duration_ms, "Turn committed");

        Ok(TurnReply {
            session_id: id.clone(),
            reply,
            history_len,
            iterations: outcome.iterations,
            tool_calls: outcome.tool_calls,
        })
    }

    fn session_lock(&self, id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.clone()).or_default().clone()
    }

    /// Forget locks nobody is holding or waiting on.
    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
