use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::{BrowserError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// A clickable element, optionally narrowed to the match containing `has_text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClickTarget {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_text: Option<String>,
}

impl ClickTarget {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            has_text: None,
        }
    }

    pub fn with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            has_text: Some(text.into()),
        }
    }
}

impl fmt::Display for ClickTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.has_text {
            Some(text) => write!(f, "{} (text: {:?})", self.selector, text),
            None => f.write_str(&self.selector),
        }
    }
}

/// A completed browser download, fully read into memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Download {
    pub suggested_filename: String,
    pub content: Vec<u8>,
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("suggested_filename", &self.suggested_filename)
            .field("bytes", &self.content.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchOptions {
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Upper bound for the browser to come up and report ready.
    #[serde(default = "default_startup_timeout", with = "duration_ms")]
    pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            startup_timeout: default_startup_timeout(),
        }
    }
}

/// One browser page, exclusively owned by a single run.
///
/// Every operation that waits on the page takes an explicit timeout; an
/// expired wait surfaces as [`crate::BrowserError::Timeout`].
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn fill(&self, selector: &str, text: &str, timeout: Duration) -> Result<()>;

    async fn click(&self, target: &ClickTarget, timeout: Duration) -> Result<()>;

    /// Evaluates a JavaScript expression in the page and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// [`evaluate`](Self::evaluate) bounded by `timeout`; an evaluation still
    /// pending at that point fails with [`BrowserError::Timeout`].
    async fn evaluate_within(&self, expression: &str, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.evaluate(expression)).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::timeout("evaluate", timeout)),
        }
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Clicks `trigger` with a download expectation already registered and
    /// blocks until the browser reports the download complete.
    async fn capture_download(&self, trigger: &ClickTarget, timeout: Duration) -> Result<Download>;

    /// Releases the browser. Calling it twice is a no-op.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowsingSession>>;
}

fn default_headless() -> bool {
    true
}

fn default_startup_timeout() -> Duration {
    Duration::from_secs(60)
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
