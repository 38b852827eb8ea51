//! Unified error types for agendabot.

use thiserror::Error;

/// Result type alias using AgendaError.
pub type Result<T> = std::result::Result<T, AgendaError>;

#[derive(Error, Debug)]
pub enum AgendaError {
    // Calendar store errors
    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Calendar item not found: {0}")]
    ItemNotFound(String),

    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    // Dose store errors
    #[error("Dose store error: {0}")]
    Store(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time of day (expected HH:MM): {0}")]
    InvalidTime(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl AgendaError {
    pub fn calendar(msg: impl Into<String>) -> Self {
        Self::Calendar(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the failure came from an external collaborator and may clear up
    /// on the next scheduled tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Calendar(_) | Self::Channel(_) | Self::Http(_) | Self::Timeout(_)
        )
    }
}
