use super::{validate_user_record, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use keystead_core::{StorageError, StorageResult, User};
use sqlx::SqlitePool;
use tracing::{debug, info};

const COMPONENT: &str = "sqlite_users";

/// Database user record
#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    id: String,
    username: String,
    password_hash: String,
    roles: String, // JSON array
}

impl UserRecord {
    fn into_user(self) -> StorageResult<User> {
        let roles: Vec<String> = serde_json::from_str(&self.roles).map_err(|e| {
            StorageError::invalid_record(
                COMPONENT,
                format!("roles for '{}' are not a JSON array: {}", self.username, e),
            )
        })?;

        Ok(User {
            id: self.id,
            username: self.username,
            password_hash: self.password_hash,
            roles,
        })
    }
}

/// User store backed by the `auth_users` table
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Wrap `pool`, creating the table if it does not exist
    pub async fn new(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                roles TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::database(COMPONENT, "create_tables", e))?;

        info!("auth_users table ready");
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_by_username(&self, username: &str) -> StorageResult<User> {
        if username.trim().is_empty() {
            return Err(StorageError::user_not_found(username));
        }

        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password_hash, roles FROM auth_users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::database(COMPONENT, "get_by_username", e))?;

        match record {
            Some(record) => record.into_user(),
            None => Err(StorageError::user_not_found(username)),
        }
    }

    async fn put(&self, user: &User) -> StorageResult<()> {
        validate_user_record(COMPONENT, user)?;

        let roles = serde_json::to_string(&user.roles)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO auth_users (id, username, password_hash, roles, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                id = excluded.id,
                password_hash = excluded.password_hash,
                roles = excluded.roles,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(roles)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::database(COMPONENT, "put", e))?;

        debug!(username = %user.username, "Upserted user");
        Ok(())
    }
}
