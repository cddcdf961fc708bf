//! User record stores
//!
//! Every backend keys users by username (case-sensitive) and treats `put`
//! as an upsert on that key.

use async_trait::async_trait;
use keystead_core::{StorageError, StorageResult, User};

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::FileUserStore;
pub use memory::MemoryUserStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteUserStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StorageError::NotFound`] when no such user exists
    async fn get_by_username(&self, username: &str) -> StorageResult<User>;

    /// Insert or replace the record with the same username
    async fn put(&self, user: &User) -> StorageResult<()>;
}

/// Reject records no backend should accept
pub(crate) fn validate_user_record(component: &str, user: &User) -> StorageResult<()> {
    if user.id.is_empty() {
        return Err(StorageError::invalid_record(component, "user id is empty"));
    }
    if user.username.trim().is_empty() {
        return Err(StorageError::invalid_record(component, "username is blank"));
    }
    if user.password_hash.is_empty() {
        return Err(StorageError::invalid_record(
            component,
            format!("password hash for '{}' is empty", user.username),
        ));
    }
    Ok(())
}
