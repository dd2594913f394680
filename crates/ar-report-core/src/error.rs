//! Error types for a report run.

use ar_report_browser::BrowserError;
use std::path::PathBuf;

use crate::navigator::NavStep;

/// Pre-flight problems, detected before any browser is launched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing credentials: {0} not set")]
    MissingCredentials(String),

    #[error("output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("portal unreachable: {0}")]
    Unreachable(#[source] BrowserError),

    #[error("login form not available: {0}")]
    FormMissing(#[source] BrowserError),

    #[error("portal did not settle after login: {0}")]
    NotSettled(#[source] BrowserError),

    #[error("login rejected: the login form is still shown after submitting")]
    Rejected,

    #[error("could not verify login: {0}")]
    Browser(#[source] BrowserError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid artifact name {0:?}")]
    InvalidName(String),

    #[error("failed to stage artifact in {dir}: {source}")]
    Stage {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to move artifact to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to launch browser: {0}")]
    Launch(#[source] BrowserError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("navigation stalled at {step}: not ready within {timeout_ms} ms")]
    NavigationTimeout { step: NavStep, timeout_ms: u64 },

    #[error("navigation failed at {step}: {source}")]
    Navigation {
        step: NavStep,
        #[source]
        source: BrowserError,
    },

    #[error("report did not render within {timeout_ms} ms (waiting for {waiting_for})")]
    ReportTimeout {
        waiting_for: String,
        timeout_ms: u64,
    },

    #[error("report submission failed: {0}")]
    Report(#[source] BrowserError),

    #[error("download did not complete within {timeout_ms} ms")]
    DownloadTimeout { timeout_ms: u64 },

    #[error("download failed: {0}")]
    Download(#[source] BrowserError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReportError {
    /// Short, stable name of the failure class, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            ReportError::Config(_) => "config",
            ReportError::Launch(_) => "launch",
            ReportError::Auth(_) => "auth",
            ReportError::NavigationTimeout { .. } => "navigation_timeout",
            ReportError::Navigation { .. } => "navigation",
            ReportError::ReportTimeout { .. } => "report_timeout",
            ReportError::Report(_) => "report",
            ReportError::DownloadTimeout { .. } => "download_timeout",
            ReportError::Download(_) => "download",
            ReportError::Storage(_) => "storage",
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ReportError::Config(_))
    }
}

/// Milliseconds carried by a browser timeout, or the fallback bound.
pub(crate) fn timeout_ms(err: &BrowserError, fallback: std::time::Duration) -> u64 {
    match err {
        BrowserError::Timeout { timeout_ms, .. } => *timeout_ms,
        _ => fallback.as_millis() as u64,
    }
}
