//! Authentication error types

use crate::password::PolicyViolation;
use keystead_core::StorageError;
use thiserror::Error;

/// Authentication operation result type
pub type AuthResult<T> = Result<T, AuthError>;

/// Failures surfaced by [`crate::AuthService`]
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password; the two are never distinguished
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Absent, revoked or expired session token
    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Password does not meet policy: {0}")]
    WeakPassword(PolicyViolation),

    #[error("Session lacks required role '{role}'")]
    Forbidden { role: String },

    /// The secure random source failed
    #[error("Entropy source failure: {message}")]
    Entropy { message: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AuthError {
    /// Whether the caller, rather than the infrastructure, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::WeakPassword(_)
                | AuthError::Forbidden { .. }
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
