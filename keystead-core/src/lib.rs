//! Keystead Core - data model, errors, configuration and logging
//!
//! Shared by the authentication crate and the operator CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use chrono;
pub use tracing;
