use super::SessionPersistence;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use keystead_core::{Session, SessionTable, StorageError, StorageResult};
use sqlx::SqlitePool;
use tracing::{debug, info};

const COMPONENT: &str = "sqlite_sessions";

/// Database session row
#[derive(Debug, sqlx::FromRow)]
struct SessionRecord {
    token: String,
    session_id: String,
    user_id: String,
    username: String,
    roles: String,      // JSON array
    created_at: String, // RFC 3339
    expires_at: String, // RFC 3339
}

impl SessionRecord {
    fn into_session(self) -> StorageResult<Session> {
        let roles: Vec<String> = serde_json::from_str(&self.roles).map_err(|e| {
            StorageError::invalid_record(
                COMPONENT,
                format!("roles for session {} are not a JSON array: {}", self.session_id, e),
            )
        })?;

        Ok(Session {
            created_at: parse_timestamp(&self.session_id, "created_at", &self.created_at)?,
            expires_at: parse_timestamp(&self.session_id, "expires_at", &self.expires_at)?,
            id: self.session_id,
            token: self.token,
            user_id: self.user_id,
            username: self.username,
            roles,
        })
    }
}

fn parse_timestamp(session_id: &str, column: &str, value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::invalid_record(
                COMPONENT,
                format!("{} of session {} is not RFC 3339: {}", column, session_id, e),
            )
        })
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Session table mirrored into `auth_sessions`
#[derive(Debug, Clone)]
pub struct SqliteSessionPersistence {
    pool: SqlitePool,
}

impl SqliteSessionPersistence {
    /// Wrap `pool`, creating the table if it does not exist
    pub async fn new(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_sessions (
                token TEXT PRIMARY KEY,
                session_id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                roles TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::database(COMPONENT, "create_tables", e))?;

        info!("auth_sessions table ready");
        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for SqliteSessionPersistence {
    async fn load(&self) -> StorageResult<SessionTable> {
        let records = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT token, session_id, user_id, username, roles, created_at, expires_at
            FROM auth_sessions
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::database(COMPONENT, "load", e))?;

        let mut sessions = SessionTable::with_capacity(records.len());
        for record in records {
            let session = record.into_session()?;
            sessions.insert(session.token.clone(), session);
        }

        debug!(sessions = sessions.len(), "Loaded session state from SQLite");
        Ok(sessions)
    }

    /// Delete-then-insert inside one transaction
    async fn save(&self, sessions: &SessionTable) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::database(COMPONENT, "begin", e))?;

        sqlx::query("DELETE FROM auth_sessions")
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::database(COMPONENT, "clear", e))?;

        for (token, session) in sessions {
            let roles = serde_json::to_string(&session.roles)?;

            sqlx::query(
                r#"
                INSERT INTO auth_sessions
                (token, session_id, user_id, username, roles, created_at, expires_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(token)
            .bind(&session.id)
            .bind(&session.user_id)
            .bind(&session.username)
            .bind(roles)
            .bind(format_timestamp(&session.created_at))
            .bind(format_timestamp(&session.expires_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::database(COMPONENT, "insert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::database(COMPONENT, "commit", e))?;

        debug!(sessions = sessions.len(), "Saved session state to SQLite");
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
