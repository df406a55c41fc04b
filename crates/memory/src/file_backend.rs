//! File-based session store — persistent JSON-lines storage.
//!
//! Each line is one `{"session_id": ..., "message": ...}` record. Appends add
//! lines at the end of the file; only eviction and deletion rewrite it.
//! The whole file is replayed into memory on startup.

use crate::table::SessionTable;
use async_trait::async_trait;
use ronnyx_core::error::SessionError;
use ronnyx_core::message::Message;
use ronnyx_core::session::{SessionId, SessionStore, SessionSummary};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Serialize, Deserialize)]
struct FileRecord {
    session_id: SessionId,
    message: Message,
}

/// A file-backed session store using JSONL (one record per line).
pub struct FileStore {
    path: PathBuf,
    table: Arc<RwLock<SessionTable>>,
}

impl FileStore {
    /// Open the store at `path`, replaying any existing records.
    pub fn open(path: impl Into<PathBuf>, max_sessions: usize) -> Result<Self, SessionError> {
        let path = path.into();
        let mut table = SessionTable::new(max_sessions);
        let mut evicted_on_load = false;

        for record in Self::load_from_disk(&path)? {
            if !table.append(&record.session_id, vec![record.message]).is_empty() {
                evicted_on_load = true;
            }
        }
        debug!(path = %path.display(), sessions = table.len(), "File session store loaded");

        if evicted_on_load {
            Self::rewrite(&path, &table)?;
        }

        Ok(Self {
            path,
            table: Arc::new(RwLock::new(table)),
        })
    }

    fn load_from_disk(path: &Path) -> Result<Vec<FileRecord>, SessionError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<FileRecord>(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted session record");
                    None
                }
            })
            .collect())
    }

    fn encode(id: &SessionId, messages: &[Message]) -> Result<String, SessionError> {
        let mut out = String::new();
        for message in messages {
            let record = FileRecord {
                session_id: id.clone(),
                message: message.clone(),
            };
            let line = serde_json::to_string(&record)
                .map_err(|e| SessionError::Storage(format!("Failed to encode record: {e}")))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    fn ensure_parent(path: &Path) -> Result<(), SessionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SessionError::Storage(format!("Failed to create session directory: {e}"))
            })?;
        }
        Ok(())
    }

    /// Replace the file with the table's current contents.
    fn rewrite(path: &Path, table: &SessionTable) -> Result<(), SessionError> {
        Self::ensure_parent(path)?;
        let mut content = String::new();
        for (id, messages) in table.iter_oldest_first() {
            content.push_str(&Self::encode(id, messages)?);
        }
        std::fs::write(path, content)
            .map_err(|e| SessionError::Storage(format!("Failed to write session file: {e}")))
    }

    fn append_lines(&self, lines: &str) -> Result<(), SessionError> {
        Self::ensure_parent(&self.path)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SessionError::Storage(format!("Failed to open session file: {e}")))?;
        file.write_all(lines.as_bytes())
            .map_err(|e| SessionError::Storage(format!("Failed to append to session file: {e}")))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Vec<Message>>, SessionError> {
        Ok(self.table.read().await.get(id).map(<[Message]>::to_vec))
    }

    async fn append(&self, id: &SessionId, messages: Vec<Message>) -> Result<(), SessionError> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut table = self.table.write().await;

        // Disk first, so a failed write leaves the session unchanged.
        self.append_lines(&Self::encode(id, &messages)?)?;

        let evicted = table.append(id, messages);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Evicted sessions, rewriting file");
            Self::rewrite(&self.path, &table)?;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self.table.read().await.summaries())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        let mut table = self.table.write().await;
        if !table.remove(id) {
            return Ok(false);
        }
        Self::rewrite(&self.path, &table)?;
        Ok(true)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        Ok(self.table.read().await.len())
    }
}
