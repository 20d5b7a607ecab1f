//! Unified error types for TaskPing.

use thiserror::Error;

/// Result type alias using TaskPingError.
pub type Result<T> = std::result::Result<T, TaskPingError>;

#[derive(Error, Debug)]
pub enum TaskPingError {
    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    // Caller contract violations
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TaskPingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Data errors are reported to the caller as "not found" outcomes.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
