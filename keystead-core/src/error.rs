//! Unified error handling system
//!
//! Provides structured storage and configuration error types with context
//! and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, warn};

pub type StorageResult<T> = Result<T, StorageError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Error context providing additional information for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }
}

/// Failure reading or writing a user store or session persistence backend
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Invalid record: {message}")]
    InvalidRecord {
        message: String,
        context: ErrorContext,
    },
}

impl StorageError {
    pub fn user_not_found(username: &str) -> Self {
        Self::NotFound {
            resource: format!("user '{}'", username),
        }
    }

    /// Wrap a database driver error with the component and operation it came from
    pub fn database<E>(component: &str, operation: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Database {
            message: format!("{} failed: {}", operation, source),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component).with_operation(operation),
        }
    }

    pub fn invalid_record(component: &str, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
            context: ErrorContext::new(component),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            StorageError::Database { context, .. } => Some(context),
            StorageError::InvalidRecord { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            StorageError::NotFound { .. } => {
                warn!(error = %self, "Storage lookup missed");
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Storage error occurred"
                );
            }
        }
    }
}

/// Failure loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    Env { var: String, value: String },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
