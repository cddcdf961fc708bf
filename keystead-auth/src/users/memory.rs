use super::{validate_user_record, UserStore};
use async_trait::async_trait;
use keystead_core::{StorageError, StorageResult, User};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory user store
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_username(&self, username: &str) -> StorageResult<User> {
        let users = self.users.read().await;
        users
            .get(username)
            .cloned()
            .ok_or_else(|| StorageError::user_not_found(username))
    }

    async fn put(&self, user: &User) -> StorageResult<()> {
        validate_user_record("memory_users", user)?;

        let mut users = self.users.write().await;
        users.insert(user.username.clone(), user.clone());
        debug!(username = %user.username, "Stored user in memory");
        Ok(())
    }
}
