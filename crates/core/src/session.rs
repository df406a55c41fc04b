//! Session store trait — where per-session conversation history lives.
//!
//! A session is created lazily the first time something is appended to it and
//! is never destroyed by the chat flow. Backends only ever append; nothing in
//! a stored history is rewritten or reordered.

use crate::error::SessionError;
use crate::message::Message;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller-supplied session key. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

#[derive(Debug, Clone, Error)]
#[error("session_id must not be empty")]
pub struct EmptySessionId;

impl SessionId {
    /// Parse a session key; whitespace-only keys count as empty.
    pub fn parse(raw: impl Into<String>) -> Result<Self, EmptySessionId> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(EmptySessionId);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionId {
    type Error = EmptySessionId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lightweight view of a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// The core SessionStore trait.
///
/// Implementations: in-memory (default), JSON-lines file, SQLite.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "memory", "file", "sqlite").
    fn name(&self) -> &str;

    /// Load a session's history, or `None` if the session was never created.
    async fn load(&self, id: &SessionId) -> Result<Option<Vec<Message>>, SessionError>;

    /// Append messages to a session, creating it if needed. The batch is
    /// committed as a whole.
    async fn append(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), SessionError>;

    /// List all sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError>;

    /// A session's history; unknown sessions read as empty.
    async fn history(&self, id: &SessionId) -> Result<Vec<Message>, SessionError> {
        Ok(self.load(id).await?.unwrap_or_default())
    }

    /// Number of stored sessions.
    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.list().await?.len())
    }
}
