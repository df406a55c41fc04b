//! SQLite session store.
//!
//! One table, `messages`, holds every stored message with an autoincrement
//! `seq`. A session exists once it has a message; its recency is the `seq`
//! of its newest message, which also drives eviction under `max_sessions`.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use ronnyx_core::error::SessionError;
use ronnyx_core::message::{Message, MessageToolCall, Role};
use ronnyx_core::session::{SessionId, SessionStore, SessionSummary};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteStore {
    pool: SqlitePool,
    max_sessions: usize,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Accepts a file path or a `sqlite:` URL; `sqlite::memory:` gives an
    /// ephemeral database on a single connection.
    pub async fn new(path: &str, max_sessions: usize) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SessionError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each in-memory connection would be its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool, max_sessions };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                id           TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                tool_calls   TEXT NOT NULL DEFAULT '[]',
                tool_call_id TEXT,
                timestamp    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, seq)")
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::MigrationFailed(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_role(raw: &str) -> Result<Role, SessionError> {
        match raw {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" => Ok(Role::Tool),
            other => Err(SessionError::QueryFailed(format!("unknown role '{other}'"))),
        }
    }

    fn parse_time(raw: &str) -> chrono::DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, SessionError> {
        let column = |name: &str, e: sqlx::Error| SessionError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| column("id", e))?;
        let role: String = row.try_get("role").map_err(|e| column("role", e))?;
        let content: String = row.try_get("content").map_err(|e| column("content", e))?;
        let tool_calls_json: String = row
            .try_get("tool_calls")
            .map_err(|e| column("tool_calls", e))?;
        let tool_call_id: Option<String> = row
            .try_get("tool_call_id")
            .map_err(|e| column("tool_call_id", e))?;
        let timestamp: String = row.try_get("timestamp").map_err(|e| column("timestamp", e))?;

        let tool_calls: Vec<MessageToolCall> = serde_json::from_str(&tool_calls_json)
            .map_err(|e| SessionError::QueryFailed(format!("tool_calls json: {e}")))?;

        Ok(Message {
            id,
            role: Self::parse_role(&role)?,
            content,
            tool_calls,
            tool_call_id,
            timestamp: Self::parse_time(&timestamp),
        })
    }

    async fn evict_over_cap(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        max_sessions: usize,
        keep: &SessionId,
    ) -> Result<(), SessionError> {
        let count: i64 = sqlx::query("SELECT COUNT(DISTINCT session_id) AS n FROM messages")
            .fetch_one(&mut **tx)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(|e| SessionError::QueryFailed(format!("count sessions: {e}")))?;

        let excess = count - max_sessions as i64;
        if excess <= 0 {
            return Ok(());
        }

        let victims = sqlx::query(
            r#"
            SELECT session_id FROM messages
            WHERE session_id != ?1
            GROUP BY session_id
            ORDER BY MAX(seq) ASC
            LIMIT ?2
            "#,
        )
        .bind(keep.as_str())
        .bind(excess)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| SessionError::QueryFailed(format!("select eviction: {e}")))?;

        for row in victims {
            let victim: String = row
                .try_get("session_id")
                .map_err(|e| SessionError::QueryFailed(format!("session_id column: {e}")))?;
            sqlx::query("DELETE FROM messages WHERE session_id = ?1")
                .bind(&victim)
                .execute(&mut **tx)
                .await
                .map_err(|e| SessionError::Storage(format!("DELETE failed: {e}")))?;
            debug!(session_id = %victim, "Evicted session");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Vec<Message>>, SessionError> {
        let rows = sqlx::query("SELECT * FROM messages WHERE session_id = ?1 ORDER BY seq ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SessionError::QueryFailed(format!("load session: {e}")))?;

        if rows.is_empty() {
            return Ok(None);
        }
        rows.iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    async fn append(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SessionError::Storage(format!("begin transaction: {e}")))?;

        for message in &messages {
            let tool_calls = serde_json::to_string(&message.tool_calls)
                .map_err(|e| SessionError::Storage(format!("tool_calls serialization: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO messages (session_id, id, role, content, tool_calls, tool_call_id, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(id.as_str())
            .bind(&message.id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&tool_calls)
            .bind(&message.tool_call_id)
            .bind(message.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
            .execute(&mut *tx)
            .await
            .map_err(|e| SessionError::Storage(format!("INSERT failed: {e}")))?;
        }

        if self.max_sessions > 0 {
            Self::evict_over_cap(&mut tx, self.max_sessions, id).await?;
        }

        tx.commit()
            .await
            .map_err(|e| SessionError::Storage(format!("commit failed: {e}")))?;

        debug!(session_id = %id, count = messages.len(), "Appended messages");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, COUNT(*) AS message_count, MAX(timestamp) AS updated_at
            FROM messages
            GROUP BY session_id
            ORDER BY MAX(seq) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::QueryFailed(format!("list sessions: {e}")))?;

        rows.iter()
            .map(|row| {
                let raw_id: String = row
                    .try_get("session_id")
                    .map_err(|e| SessionError::QueryFailed(format!("session_id column: {e}")))?;
                let count: i64 = row
                    .try_get("message_count")
                    .map_err(|e| SessionError::QueryFailed(format!("message_count column: {e}")))?;
                let updated_at: String = row
                    .try_get("updated_at")
                    .map_err(|e| SessionError::QueryFailed(format!("updated_at column: {e}")))?;
                let id = SessionId::parse(raw_id)
                    .map_err(|e| SessionError::QueryFailed(e.to_string()))?;
                Ok(SessionSummary {
                    id,
                    message_count: count as usize,
                    updated_at: Self::parse_time(&updated_at),
                })
            })
            .collect()
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM messages WHERE session_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("DELETE failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        let count: i64 = sqlx::query("SELECT COUNT(DISTINCT session_id) AS n FROM messages")
            .fetch_one(&self.pool)
            .await
            .and_then(|row| row.try_get("n"))
            .map_err(|e| SessionError::QueryFailed(format!("count sessions: {e}")))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(max_sessions: usize) -> SqliteStore {
        SqliteStore::new("sqlite::memory:", max_sessions).await.unwrap()
    }

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn unknown_session_is_none() {
        let store = test_store(0).await;
        assert!(store.load(&sid("nope")).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn append_and_load_in_order() {
        let store = test_store(0).await;
        let id = sid("21");
        store
            .append(&id, vec![Message::user("first"), Message::assistant("second")])
            .await
            .unwrap();
        store.append(&id, vec![Message::user("third")]).await.unwrap();

        let history = store.history(&id).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn tool_calls_roundtrip_through_storage() {
        let store = test_store(0).await;
        let mut msg = Message::assistant("");
        msg.tool_calls.push(MessageToolCall {
            id: "call_1".into(),
            name: "github_whoami".into(),
            arguments: "{}".into(),
        });
        store.append(&sid("t"), vec![msg.clone()]).await.unwrap();

        let loaded = store.history(&sid("t")).await.unwrap();
        assert_eq!(loaded[0].tool_calls, msg.tool_calls);
        assert_eq!(loaded[0].id, msg.id);
    }

    #[tokio::test]
    async fn list_and_delete() {
        let store = test_store(0).await;
        store.append(&sid("a"), vec![Message::user("x")]).await.unwrap();
        store
            .append(&sid("b"), vec![Message::user("y"), Message::assistant("z")])
            .await
            .unwrap();

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, sid("b"));
        assert_eq!(list[0].message_count, 2);

        assert!(store.delete(&sid("a")).await.unwrap());
        assert!(!store.delete(&sid("a")).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn max_sessions_evicts_oldest() {
        let store = test_store(2).await;
        store.append(&sid("a"), vec![Message::user("1")]).await.unwrap();
        store.append(&sid("b"), vec![Message::user("2")]).await.unwrap();
        store.append(&sid("a"), vec![Message::user("3")]).await.unwrap();
        store.append(&sid("c"), vec![Message::user("4")]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.load(&sid("b")).await.unwrap().is_none());
        assert_eq!(store.history(&sid("a")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let path = path.to_str().unwrap();
        {
            let store = SqliteStore::new(path, 0).await.unwrap();
            store.append(&sid("p"), vec![Message::user("kept")]).await.unwrap();
            store.pool.close().await;
        }
        let store = SqliteStore::new(path, 0).await.unwrap();
        assert_eq!(store.history(&sid("p")).await.unwrap()[0].content, "kept");
    }
}
