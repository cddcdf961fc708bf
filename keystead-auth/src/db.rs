//! SQLite connection setup

use keystead_core::{StorageError, StorageResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

/// Open a pool for `database_url`, creating the database file if needed.
///
/// In-memory databases get a single connection that never idles out, since
/// every connection to `sqlite::memory:` is a separate database.
pub async fn connect_sqlite(database_url: &str) -> StorageResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| StorageError::database("sqlite", "parse_url", e))?
        .create_if_missing(true);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| StorageError::database("sqlite", "connect", e))?;

    info!(in_memory, "Connected to SQLite database");
    Ok(pool)
}
