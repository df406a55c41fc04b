//! In-memory session store — the default; history lives as long as the process.

use crate::table::SessionTable;
use async_trait::async_trait;
use ronnyx_core::error::SessionError;
use ronnyx_core::message::Message;
use ronnyx_core::session::{SessionId, SessionStore, SessionSummary};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct InMemoryStore {
    table: Arc<RwLock<SessionTable>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_max_sessions(0)
    }

    /// Cap the number of sessions; 0 means unbounded.
    pub fn with_max_sessions(max_sessions: usize) -> Self {
        Self {
            table: Arc::new(RwLock::new(SessionTable::new(max_sessions))),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Vec<Message>>, SessionError> {
        Ok(self.table.read().await.get(id).map(<[Message]>::to_vec))
    }

    async fn append(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), SessionError> {
        let evicted = self.table.write().await.append(id, messages);
        for old in evicted {
            debug!(session_id = %old, "Evicted session");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self.table.read().await.summaries())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        Ok(self.table.write().await.remove(id))
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.table.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ronnyx_core::message::Role;

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn unknown_session_reads_empty() {
        let store = InMemoryStore::new();
        assert!(store.load(&sid("21")).await.unwrap().is_none());
        assert!(store.history(&sid("21")).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = InMemoryStore::new();
        let id = sid("21");
        store
            .append(&id, vec![Message::user("one"), Message::assistant("two")])
            .await
            .unwrap();
        store
            .append(&id, vec![Message::user("three"), Message::assistant("four")])
            .await
            .unwrap();

        let history = store.history(&id).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
        assert_eq!(history[2].role, Role::User);
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let store = InMemoryStore::new();
        store.append(&sid("a"), vec![Message::user("for a")]).await.unwrap();
        store.append(&sid("b"), vec![Message::user("for b")]).await.unwrap();

        assert_eq!(store.history(&sid("a")).await.unwrap()[0].content, "for a");
        assert_eq!(store.history(&sid("b")).await.unwrap().len(), 1);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_session() {
        let store = InMemoryStore::new();
        store.append(&sid("a"), vec![Message::user("x")]).await.unwrap();
        assert!(store.delete(&sid("a")).await.unwrap());
        assert!(!store.delete(&sid("a")).await.unwrap());
    }

    #[tokio::test]
    async fn max_sessions_cap() {
        let store = InMemoryStore::with_max_sessions(1);
        store.append(&sid("a"), vec![Message::user("x")]).await.unwrap();
        store.append(&sid("b"), vec![Message::user("y")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.load(&sid("a")).await.unwrap().is_none());
    }
}
