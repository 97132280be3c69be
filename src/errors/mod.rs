//! Error handling module for the sync pipeline.
//!
//! Provides the centralized error type shared by every pipeline component.
//! No error here is ever surfaced to an end user: failures are terminal for
//! the affected item and non-fatal for the run that produced them.

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Remote fetch failed at the transport level
    Network(String),
    /// Remote payload had an unexpected shape
    RemoteFormat(String),
    /// Database constraint violation or connection failure
    Database(String),
    /// Asset store lookup failed
    Storage(String),
    /// Change-set submission to the remote repository failed
    Publish(String),
}

impl AppError {
    /// Get the error message.
    pub fn message(&self) -> &str {
        match self {
            AppError::Network(msg) => msg,
            AppError::RemoteFormat(msg) => msg,
            AppError::Database(msg) => msg,
            AppError::Storage(msg) => msg,
            AppError::Publish(msg) => msg,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::Network(_) => "NETWORK",
            AppError::RemoteFormat(_) => "REMOTE_FORMAT",
            AppError::Database(_) => "DATABASE",
            AppError::Storage(_) => "STORAGE",
            AppError::Publish(_) => "PUBLISH",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Network error: {:?}", err);
        AppError::Network(format!("Network error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::RemoteFormat(format!("JSON error: {}", err))
    }
}
