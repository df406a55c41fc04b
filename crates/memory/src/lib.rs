//! Session store implementations for Ronnyx.
//!
//! All stores implement `ronnyx_core::SessionStore`. [`open_store`] builds
//! the one named in `[sessions]`.

mod table;

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use ronnyx_config::{SessionBackend, SessionsConfig};
use ronnyx_core::error::SessionError;
use ronnyx_core::session::SessionStore;
use std::sync::Arc;

/// Build the configured session store.
pub async fn open_store(config: &SessionsConfig) -> Result<Arc<dyn SessionStore>, SessionError> {
    let store: Arc<dyn SessionStore> = match config.backend {
        SessionBackend::Memory => Arc::new(InMemoryStore::with_max_sessions(config.max_sessions)),
        SessionBackend::File => Arc::new(FileStore::open(
            config.resolved_path(),
            config.max_sessions,
        )?),
        #[cfg(feature = "sqlite")]
        SessionBackend::Sqlite => {
            let path = config.resolved_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SessionError::Storage(format!("Failed to create session directory: {e}"))
                })?;
            }
            Arc::new(SqliteStore::new(&path.to_string_lossy(), config.max_sessions).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        SessionBackend::Sqlite => {
            return Err(SessionError::Storage(
                "sqlite backend requires the `sqlite` feature".into(),
            ));
        }
    };
    tracing::info!(backend = store.name(), "Session store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_opens_memory_store() {
        let store = open_store(&SessionsConfig::default()).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn file_backend_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionsConfig {
            backend: SessionBackend::File,
            path: Some(dir.path().join("s.jsonl")),
            max_sessions: 0,
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "file");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_backend_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("sessions.db");
        let config = SessionsConfig {
            backend: SessionBackend::Sqlite,
            path: Some(path.clone()),
            max_sessions: 0,
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(path.exists());
    }
}
