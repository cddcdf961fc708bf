//! Configuration management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables (a `.env` file is honored through `dotenvy`).

use crate::error::{ConfigError, ConfigResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_PEPPER: &str = "change-me-in-production";

/// Upper bound on the session TTL (ten years)
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysteadConfig {
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Authentication settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Server-side secret mixed into every password hash
    pub password_pepper: String,
    /// Session time-to-live in seconds
    pub session_ttl_secs: u64,
    pub bootstrap_username: String,
    pub bootstrap_password: String,
    /// What to do when the secure random source fails while generating a session id
    pub session_id_fallback: SessionIdFallback,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_pepper: DEFAULT_PEPPER.to_string(),
            session_ttl_secs: 3600,
            bootstrap_username: "admin".to_string(),
            bootstrap_password: "admin123".to_string(),
            session_id_fallback: SessionIdFallback::Reject,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("password_pepper", &"<redacted>")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("bootstrap_username", &self.bootstrap_username)
            .field("bootstrap_password", &"<redacted>")
            .field("session_id_fallback", &self.session_id_fallback)
            .finish()
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS) as i64)
    }

    pub fn uses_default_pepper(&self) -> bool {
        self.password_pepper == DEFAULT_PEPPER
    }
}

/// Session-id generation policy when the random source fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionIdFallback {
    /// Fail the login outright
    #[default]
    Reject,
    /// Derive a low-entropy id from the current timestamp
    Timestamp,
}

impl std::str::FromStr for SessionIdFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(format!("unknown session id fallback: {}", other)),
        }
    }
}

/// Backend selection and locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// When set, users and sessions live in this SQLite database
    pub database_url: Option<String>,
    pub user_state_file: PathBuf,
    pub session_state_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            user_state_file: PathBuf::from("./data/auth_users.json"),
            session_state_file: PathBuf::from("./data/auth_sessions.json"),
        }
    }
}

impl KeysteadConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: KeysteadConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// Overlay variables from the process environment (and `.env`, if present)
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        dotenvy::dotenv().ok();
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup`; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("AUTH_PASSWORD_PEPPER") {
            self.auth.password_pepper = v;
        }
        if let Some(v) = get("AUTH_SESSION_TTL_SEC") {
            self.auth.session_ttl_secs = v.trim().parse().map_err(|_| ConfigError::Env {
                var: "AUTH_SESSION_TTL_SEC".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("AUTH_BOOTSTRAP_USERNAME") {
            self.auth.bootstrap_username = v;
        }
        if let Some(v) = get("AUTH_BOOTSTRAP_PASSWORD") {
            self.auth.bootstrap_password = v;
        }
        if let Some(v) = get("AUTH_SESSION_ID_FALLBACK") {
            self.auth.session_id_fallback = v.parse().map_err(|_| ConfigError::Env {
                var: "AUTH_SESSION_ID_FALLBACK".to_string(),
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("DATABASE_URL") {
            self.storage.database_url = Some(v);
        }
        if let Some(v) = get("AUTH_SESSION_STATE_FILE") {
            self.storage.session_state_file = PathBuf::from(v);
        }
        if let Some(v) = get("AUTH_USER_STATE_FILE") {
            self.storage.user_state_file = PathBuf::from(v);
        }
        if let Some(v) = get("KEYSTEAD_LOG_LEVEL") {
            self.logging.level = v;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.auth.password_pepper.is_empty() {
            return Err(ConfigError::invalid(
                "auth.password_pepper",
                "must not be empty",
            ));
        }

        if self.auth.session_ttl_secs == 0 {
            return Err(ConfigError::invalid(
                "auth.session_ttl_secs",
                "must be greater than 0",
            ));
        }

        if self.auth.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::invalid(
                "auth.session_ttl_secs",
                format!("must not exceed {} seconds", MAX_SESSION_TTL_SECS),
            ));
        }

        if self.auth.bootstrap_username.trim().is_empty() {
            return Err(ConfigError::invalid(
                "auth.bootstrap_username",
                "must not be empty",
            ));
        }

        if self.auth.bootstrap_password.is_empty() {
            return Err(ConfigError::invalid(
                "auth.bootstrap_password",
                "must not be empty",
            ));
        }

        if self.storage.database_url.is_none() {
            if self.storage.user_state_file.as_os_str().is_empty() {
                return Err(ConfigError::invalid(
                    "storage.user_state_file",
                    "must not be empty without a database",
                ));
            }
            if self.storage.session_state_file.as_os_str().is_empty() {
                return Err(ConfigError::invalid(
                    "storage.session_state_file",
                    "must not be empty without a database",
                ));
            }
        }

        Ok(())
    }
}
