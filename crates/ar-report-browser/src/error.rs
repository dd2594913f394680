//! Browser error types.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// A bounded browser operation did not finish in time.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The page rejected a command (missing element, script exception, ...).
    #[error("{operation} failed: {message}")]
    Command { operation: String, message: String },

    /// The bridge process died or produced unreadable output.
    #[error("browser bridge error: {0}")]
    Transport(String),

    /// Node.js or Playwright is not installed.
    #[error("browser runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("session already closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BrowserError {
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
