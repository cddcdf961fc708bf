use super::{validate_user_record, UserStore};
use crate::json_file::{read_json, write_json_atomic};
use async_trait::async_trait;
use keystead_core::{StorageError, StorageResult, User};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// User store persisted as a JSON array, rewritten in full on every `put`
#[derive(Debug)]
pub struct FileUserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, User>>,
}

impl FileUserStore {
    /// Load the store from `path`; a missing or empty file is an empty store
    pub async fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let records: Vec<User> = read_json(&path).await?.unwrap_or_default();

        let mut users = HashMap::with_capacity(records.len());
        for user in records {
            if user.username.trim().is_empty() {
                warn!(path = %path.display(), user_id = %user.id, "Skipping user without username");
                continue;
            }
            users.insert(user.username.clone(), user);
        }

        info!(path = %path.display(), users = users.len(), "Loaded user store");
        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    async fn persist(&self, users: &HashMap<String, User>) -> StorageResult<()> {
        let mut records: Vec<&User> = users.values().collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        write_json_atomic(&self.path, &records).await
    }
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn get_by_username(&self, username: &str) -> StorageResult<User> {
        let users = self.users.lock().await;
        users
            .get(username)
            .cloned()
            .ok_or_else(|| StorageError::user_not_found(username))
    }

    async fn put(&self, user: &User) -> StorageResult<()> {
        validate_user_record("file_users", user)?;

        let mut users = self.users.lock().await;
        let previous = users.insert(user.username.clone(), user.clone());

        if let Err(e) = self.persist(&users).await {
            match previous {
                Some(previous) => users.insert(user.username.clone(), previous),
                None => users.remove(&user.username),
            };
            return Err(e);
        }

        debug!(username = %user.username, path = %self.path.display(), "Stored user");
        Ok(())
    }
}
