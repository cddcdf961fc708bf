//! Integration tests for keystead-core infrastructure

use keystead_core::{
    ConfigError, KeysteadConfig, LogFormat, LoggingConfig, Session, SessionIdFallback,
    SessionTable, StorageError, User,
};

#[test]
fn test_error_handling() {
    let error = StorageError::database(
        "test_component",
        "load",
        std::io::Error::new(std::io::ErrorKind::Other, "locked"),
    );

    match &error {
        StorageError::Database {
            message, context, ..
        } => {
            assert!(message.contains("locked"));
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Database error"),
    }

    // Logging must not panic without a subscriber
    error.log();
    StorageError::user_not_found("nobody").log();
}

#[test]
fn test_config_file_and_env_layering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystead.toml");
    std::fs::write(
        &path,
        r#"
        [auth]
        password_pepper = "from-file"
        session_ttl_secs = 600

        [logging]
        format = "json"
        "#,
    )
    .unwrap();

    let mut config = KeysteadConfig::from_file(&path).unwrap();
    assert_eq!(config.auth.password_pepper, "from-file");
    assert_eq!(config.logging.format, LogFormat::Json);

    config
        .apply_overrides(|key| match key {
            "AUTH_SESSION_TTL_SEC" => Some("30".to_string()),
            "AUTH_SESSION_ID_FALLBACK" => Some("TIMESTAMP".to_string()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.auth.password_pepper, "from-file");
    assert_eq!(config.auth.session_ttl_secs, 30);
    assert_eq!(config.auth.session_id_fallback, SessionIdFallback::Timestamp);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_config_file() {
    let err = KeysteadConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn test_malformed_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[auth\nsession_ttl_secs = ").unwrap();

    let err = KeysteadConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, "info");
    assert_eq!(config.format, LogFormat::Compact);
    assert!(config.env_filter().is_ok());
}

#[test]
fn test_log_format_names_are_lowercase() {
    let rendered = toml::to_string(&LoggingConfig::default()).unwrap();
    assert!(rendered.contains(r#"format = "compact""#));

    let parsed: LoggingConfig = toml::from_str(r#"format = "pretty""#).unwrap();
    assert_eq!(parsed.format, LogFormat::Pretty);
}

#[test]
fn test_session_table_serializes_as_token_map() {
    let user = User::new("alice", "hash").with_roles(["reader"]);
    let now = chrono::Utc::now();
    let session = Session {
        id: "sid-a".to_string(),
        token: "tok-a".to_string(),
        user_id: user.id.clone(),
        username: user.username.clone(),
        roles: user.roles.clone(),
        created_at: now,
        expires_at: now + chrono::Duration::seconds(5),
    };

    let mut table = SessionTable::new();
    table.insert(session.token.clone(), session.clone());

    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json["tok-a"]["username"], "alice");

    let decoded: SessionTable = serde_json::from_value(json).unwrap();
    assert_eq!(decoded.get("tok-a"), Some(&session));
}
