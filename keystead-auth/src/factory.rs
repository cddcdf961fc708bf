//! Backend selection from configuration
//!
//! A database URL selects the SQLite stores; otherwise users and sessions
//! live in JSON files.

use crate::errors::{AuthError, AuthResult};
use crate::service::AuthService;
use crate::sessions::{FileSessionPersistence, SessionPersistence};
use crate::users::{FileUserStore, UserStore};
use keystead_core::{AuthConfig, KeysteadConfig, StorageConfig};
use std::sync::Arc;
use tracing::info;

/// The user store and session persistence a service runs on
pub struct AuthBackends {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionPersistence>,
}

pub async fn build_backends(storage: &StorageConfig) -> AuthResult<AuthBackends> {
    match storage.database_url.as_deref() {
        Some(url) => sqlite_backends(url).await,
        None => {
            let users = FileUserStore::open(&storage.user_state_file).await?;
            let sessions = FileSessionPersistence::new(&storage.session_state_file);
            info!(
                users = %storage.user_state_file.display(),
                sessions = %storage.session_state_file.display(),
                "Using file-backed auth storage"
            );
            Ok(AuthBackends {
                users: Arc::new(users),
                sessions: Arc::new(sessions),
            })
        }
    }
}

#[cfg(feature = "sqlite")]
async fn sqlite_backends(url: &str) -> AuthResult<AuthBackends> {
    use crate::db::connect_sqlite;
    use crate::sessions::SqliteSessionPersistence;
    use crate::users::SqliteUserStore;

    let pool = connect_sqlite(url).await?;
    let users = SqliteUserStore::new(pool.clone()).await?;
    let sessions = SqliteSessionPersistence::new(pool).await?;

    info!("Using SQLite auth storage");
    Ok(AuthBackends {
        users: Arc::new(users),
        sessions: Arc::new(sessions),
    })
}

#[cfg(not(feature = "sqlite"))]
async fn sqlite_backends(_url: &str) -> AuthResult<AuthBackends> {
    Err(AuthError::config(
        "a database URL was configured but SQLite support is not compiled in",
    ))
}

/// Build the service for `config` and load its persisted session state
pub async fn build_service(config: &KeysteadConfig) -> AuthResult<AuthService> {
    config
        .validate()
        .map_err(|e| AuthError::config(e.to_string()))?;

    let backends = build_backends(&config.storage).await?;
    let service = AuthService::new(backends.users, backends.sessions, &config.auth)?;
    service.load_session_state().await?;
    Ok(service)
}

/// Make sure the configured bootstrap administrator exists
pub async fn ensure_bootstrap_user(service: &AuthService, auth: &AuthConfig) -> AuthResult<bool> {
    service
        .ensure_user(
            &auth.bootstrap_username,
            &auth.bootstrap_password,
            &["admin".to_string()],
        )
        .await
}
