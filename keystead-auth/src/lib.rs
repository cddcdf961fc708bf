//! Keystead Auth - password verification and session lifecycle
//!
//! This crate provides:
//!
//! - Peppered password hashing and a password complexity policy
//! - [`UserStore`] backends (memory, JSON file, SQLite)
//! - [`SessionPersistence`] backends (memory, JSON file, SQLite)
//! - [`AuthService`], which issues, validates and revokes bearer sessions
//!
//! ## Architecture
//!
//! The service depends only on the two storage traits; concrete backends are
//! chosen at construction time, usually through [`build_service`].

pub mod clock;
#[cfg(feature = "sqlite")]
pub mod db;
pub mod entropy;
pub mod errors;
pub mod factory;
mod json_file;
pub mod password;
pub mod service;
pub mod sessions;
pub mod users;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entropy::{EntropySource, OsEntropy};
pub use errors::{AuthError, AuthResult};
pub use factory::{build_backends, build_service, ensure_bootstrap_user, AuthBackends};
pub use password::{PasswordHasher, PasswordPolicy, PolicyViolation};
pub use service::AuthService;
pub use sessions::{FileSessionPersistence, MemorySessionPersistence, SessionPersistence};
pub use users::{FileUserStore, MemoryUserStore, UserStore};

#[cfg(feature = "sqlite")]
pub use sessions::SqliteSessionPersistence;
#[cfg(feature = "sqlite")]
pub use users::SqliteUserStore;
