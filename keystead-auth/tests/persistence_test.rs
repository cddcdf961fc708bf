//! Restart survival and rollback behaviour across persistence backends

mod common;

use chrono::Duration;
use common::{add_user, auth_config, harness};
use keystead_auth::{
    build_service, AuthError, AuthService, FileSessionPersistence, FileUserStore,
    MemoryUserStore, SessionPersistence, UserStore,
};
use keystead_core::KeysteadConfig;
use std::sync::Arc;

#[tokio::test]
async fn test_file_sessions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let sessions_path = dir.path().join("data/auth_sessions.json");
    let users = Arc::new(MemoryUserStore::new());

    let first = AuthService::new(
        users.clone(),
        Arc::new(FileSessionPersistence::new(&sessions_path)),
        &auth_config(3600),
    )
    .unwrap();
    add_user(&first, users.as_ref(), "admin", "secret123", &["admin"]).await;

    let kept = first.login("admin", "secret123").await.unwrap();
    let dropped = first.login("admin", "secret123").await.unwrap();
    first.logout(&dropped.token).await.unwrap();
    drop(first);

    let second = AuthService::new(
        users.clone(),
        Arc::new(FileSessionPersistence::new(&sessions_path)),
        &auth_config(3600),
    )
    .unwrap();
    assert_eq!(second.active_session_count().await, 0);
    assert_eq!(second.load_session_state().await.unwrap(), 1);

    let restored = second.validate_token(&kept.token).await.unwrap();
    assert_eq!(restored, kept);
    assert!(second.validate_token(&dropped.token).await.is_err());
}

#[tokio::test]
async fn test_expired_sessions_are_not_revived_by_reload() {
    let h = harness(5).await;
    let session = h.service.login("admin", "secret123").await.unwrap();

    h.clock.advance(Duration::seconds(10));
    h.service.load_session_state().await.unwrap();

    assert_eq!(h.service.active_session_count().await, 1);
    assert!(h.service.validate_token(&session.token).await.is_err());
    assert_eq!(h.service.active_session_count().await, 0);
}

#[tokio::test]
async fn test_login_rolls_back_when_persist_fails() {
    let h = harness(60).await;
    let existing = h.service.login("admin", "secret123").await.unwrap();

    h.persistence.set_failing(true);
    let err = h.service.login("admin", "secret123").await.unwrap_err();
    assert!(matches!(err, AuthError::Storage(_)));
    assert!(!err.is_client_error());

    assert_eq!(h.service.active_session_count().await, 1);
    let stored = h.persistence.stored().await;
    assert_eq!(stored.len(), 1);
    assert!(stored.contains_key(&existing.token));
}

#[tokio::test]
async fn test_revocation_rolls_back_when_persist_fails() {
    let h = harness(60).await;
    let session = h.service.login("admin", "secret123").await.unwrap();

    h.persistence.set_failing(true);
    assert!(matches!(
        h.service.logout(&session.token).await,
        Err(AuthError::Storage(_))
    ));
    assert!(matches!(
        h.service.revoke_session_by_id(&session.id).await,
        Err(AuthError::Storage(_))
    ));

    // Still valid in memory and in storage
    assert!(h.service.validate_token(&session.token).await.is_ok());
    assert!(h.persistence.stored().await.contains_key(&session.token));

    h.persistence.set_failing(false);
    h.service.revoke_session_by_id(&session.id).await.unwrap();
    assert!(h.service.validate_token(&session.token).await.is_err());
}

#[tokio::test]
async fn test_eviction_is_best_effort() {
    let h = harness(1).await;
    let a = h.service.login("admin", "secret123").await.unwrap();
    let b = h.service.login("admin", "secret123").await.unwrap();

    h.clock.advance(Duration::seconds(2));
    h.persistence.set_failing(true);

    // Read paths still answer correctly
    assert!(matches!(
        h.service.validate_token(&a.token).await,
        Err(AuthError::InvalidToken)
    ));
    assert!(h.service.list_sessions().await.is_empty());
    assert!(h.service.validate_token(&b.token).await.is_err());

    // Storage still holds the stale snapshot until the next successful save
    assert_eq!(h.persistence.stored().await.len(), 2);
}

#[tokio::test]
async fn test_file_backed_service_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = KeysteadConfig::default();
    config.auth.password_pepper = "cfg-pepper".to_string();
    config.storage.user_state_file = dir.path().join("users.json");
    config.storage.session_state_file = dir.path().join("sessions.json");

    let service = build_service(&config).await.unwrap();
    assert!(keystead_auth::ensure_bootstrap_user(&service, &config.auth)
        .await
        .unwrap());
    let session = service.login("admin", "admin123").await.unwrap();
    assert_eq!(session.roles, vec!["admin".to_string()]);
    drop(service);

    // Users and sessions both come back from disk
    let users = FileUserStore::open(&config.storage.user_state_file)
        .await
        .unwrap();
    assert_eq!(
        users.get_by_username("admin").await.unwrap().id,
        "bootstrap-admin"
    );

    let reopened = build_service(&config).await.unwrap();
    assert!(!keystead_auth::ensure_bootstrap_user(&reopened, &config.auth)
        .await
        .unwrap());
    assert!(reopened.validate_token(&session.token).await.is_ok());
    assert!(FileSessionPersistence::new(&config.storage.session_state_file)
        .load()
        .await
        .unwrap()
        .contains_key(&session.token));
}

#[tokio::test]
async fn test_build_service_rejects_invalid_config() {
    let mut config = KeysteadConfig::default();
    config.auth.session_ttl_secs = 0;

    assert!(matches!(
        build_service(&config).await,
        Err(AuthError::Config { .. })
    ));
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use keystead_auth::db::connect_sqlite;
    use keystead_auth::{SqliteSessionPersistence, SqliteUserStore};

    #[tokio::test]
    async fn test_sqlite_sessions_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("auth.db").display());

        let pool = connect_sqlite(&url).await.unwrap();
        let users = Arc::new(SqliteUserStore::new(pool.clone()).await.unwrap());
        let first = AuthService::new(
            users.clone(),
            Arc::new(SqliteSessionPersistence::new(pool.clone()).await.unwrap()),
            &auth_config(3600),
        )
        .unwrap();
        add_user(&first, users.as_ref(), "admin", "secret123", &["admin"]).await;

        let session = first.login("admin", "secret123").await.unwrap();
        drop(first);
        pool.close().await;

        let pool = connect_sqlite(&url).await.unwrap();
        let second = AuthService::new(
            Arc::new(SqliteUserStore::new(pool.clone()).await.unwrap()),
            Arc::new(SqliteSessionPersistence::new(pool).await.unwrap()),
            &auth_config(3600),
        )
        .unwrap();
        second.load_session_state().await.unwrap();

        assert_eq!(second.validate_token(&session.token).await.unwrap(), session);
        assert!(second.login("admin", "secret123").await.is_ok());
    }

    #[tokio::test]
    async fn test_database_url_selects_sqlite() {
        let mut config = KeysteadConfig::default();
        config.storage.database_url = Some("sqlite::memory:".to_string());

        let service = build_service(&config).await.unwrap();
        keystead_auth::ensure_bootstrap_user(&service, &config.auth)
            .await
            .unwrap();

        let session = service.login("admin", "admin123").await.unwrap();
        service.revoke_session_by_id(&session.id).await.unwrap();
        assert!(service.list_session_views().await.is_empty());
    }
}
