//! Session persistence backends
//!
//! Backends mirror the live session table: `save` always receives the full
//! snapshot and replaces whatever was stored before.

use async_trait::async_trait;
use keystead_core::{SessionTable, StorageResult};

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use file::FileSessionPersistence;
pub use memory::MemorySessionPersistence;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionPersistence;

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// The stored table, or an empty one if nothing was saved yet
    async fn load(&self) -> StorageResult<SessionTable>;

    /// Replace the stored table with `sessions`
    async fn save(&self, sessions: &SessionTable) -> StorageResult<()>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
