//! Shared fixtures for the auth integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use keystead_auth::{
    AuthService, EntropySource, ManualClock, MemorySessionPersistence, MemoryUserStore,
    SessionPersistence, UserStore,
};
use keystead_core::{AuthConfig, SessionTable, StorageError, StorageResult, User};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn auth_config(ttl_secs: u64) -> AuthConfig {
    AuthConfig {
        password_pepper: "integration-pepper".to_string(),
        session_ttl_secs: ttl_secs,
        ..AuthConfig::default()
    }
}

/// Put `username` with `password` and `roles` through the service's hasher
pub async fn add_user(
    service: &AuthService,
    users: &dyn UserStore,
    username: &str,
    password: &str,
    roles: &[&str],
) -> User {
    let user = User::new(username, service.hash_password(password)).with_roles(roles.iter().copied());
    users.put(&user).await.unwrap();
    user
}

pub struct Harness {
    pub service: AuthService,
    pub users: Arc<MemoryUserStore>,
    pub persistence: Arc<FlakyPersistence>,
    pub clock: Arc<ManualClock>,
}

/// A service over memory backends with `admin`/`secret123` (role `admin`)
pub async fn harness(ttl_secs: u64) -> Harness {
    let users = Arc::new(MemoryUserStore::new());
    let persistence = Arc::new(FlakyPersistence::default());
    let clock = Arc::new(ManualClock::default());

    let service = AuthService::new(users.clone(), persistence.clone(), &auth_config(ttl_secs))
        .unwrap()
        .with_clock(clock.clone());
    add_user(&service, users.as_ref(), "admin", "secret123", &["admin"]).await;

    Harness {
        service,
        users,
        persistence,
        clock,
    }
}

/// Memory persistence whose saves can be made to fail
#[derive(Default)]
pub struct FlakyPersistence {
    inner: MemorySessionPersistence,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl FlakyPersistence {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> SessionTable {
        self.inner.load().await.unwrap()
    }
}

#[async_trait]
impl SessionPersistence for FlakyPersistence {
    async fn load(&self) -> StorageResult<SessionTable> {
        self.inner.load().await
    }

    async fn save(&self, sessions: &SessionTable) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(sessions).await
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}

/// Random source that works for the first `ok_calls` draws and fails afterwards
pub struct ExhaustibleEntropy {
    ok_calls: usize,
    calls: AtomicUsize,
}

impl ExhaustibleEntropy {
    pub fn new(ok_calls: usize) -> Self {
        Self {
            ok_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EntropySource for ExhaustibleEntropy {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.ok_calls {
            return Err(rand::Error::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                "entropy pool unavailable",
            )));
        }
        keystead_auth::OsEntropy.fill(dest)
    }
}
