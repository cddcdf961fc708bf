use super::SessionPersistence;
use async_trait::async_trait;
use keystead_core::{SessionTable, StorageResult};
use tokio::sync::RwLock;

/// Keeps the last saved snapshot in process memory
#[derive(Debug, Default)]
pub struct MemorySessionPersistence {
    snapshot: RwLock<SessionTable>,
}

impl MemorySessionPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionPersistence for MemorySessionPersistence {
    async fn load(&self) -> StorageResult<SessionTable> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, sessions: &SessionTable) -> StorageResult<()> {
        *self.snapshot.write().await = sessions.clone();
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
