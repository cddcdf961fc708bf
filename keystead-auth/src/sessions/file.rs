use super::SessionPersistence;
use crate::json_file::{read_json, write_json_atomic};
use async_trait::async_trait;
use keystead_core::{SessionTable, StorageResult};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Session table stored as one JSON object keyed by token
#[derive(Debug)]
pub struct FileSessionPersistence {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionPersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SessionPersistence for FileSessionPersistence {
    async fn load(&self) -> StorageResult<SessionTable> {
        let stored: SessionTable = read_json(&self.path).await?.unwrap_or_default();

        let mut sessions = SessionTable::with_capacity(stored.len());
        for (token, mut session) in stored {
            if token.is_empty() {
                warn!(session_id = %session.id, "Skipping persisted session without token");
                continue;
            }
            // The key is authoritative
            session.token = token.clone();
            sessions.insert(token, session);
        }

        debug!(path = %self.path.display(), sessions = sessions.len(), "Loaded session state");
        Ok(sessions)
    }

    async fn save(&self, sessions: &SessionTable) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;
        write_json_atomic(&self.path, sessions).await
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use keystead_core::Session;

    fn session(token: &str, id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            token: token.to_string(),
            user_id: "u-1".to_string(),
            username: "admin".to_string(),
            roles: vec!["admin".to_string()],
            created_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionPersistence::new(dir.path().join("sessions.json"));

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionPersistence::new(dir.path().join("state/sessions.json"));

        let mut table = SessionTable::new();
        table.insert("tok-a".to_string(), session("tok-a", "sid-a"));
        table.insert("tok-b".to_string(), session("tok-b", "sid-b"));
        store.save(&table).await.unwrap();

        table.remove("tok-a");
        store.save(&table).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, table);
    }

    #[tokio::test]
    async fn test_key_wins_over_embedded_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let mut table = SessionTable::new();
        table.insert("tok-key".to_string(), session("tok-stale", "sid-1"));
        store_raw(&path, &table);

        let loaded = FileSessionPersistence::new(&path).load().await.unwrap();
        assert_eq!(loaded["tok-key"].token, "tok-key");
    }

    fn store_raw(path: &Path, table: &SessionTable) {
        std::fs::write(path, serde_json::to_string(table).unwrap()).unwrap();
    }
}
