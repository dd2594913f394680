//! Run configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PORTAL_URL: &str = "https://arll.artravels.in/";
pub const DEFAULT_OUTPUT_DIR: &str = "/github/workspace/artifacts";

const MIN_REPORT_TIMEOUT_MS: u64 = 15_000;
const MAX_REPORT_TIMEOUT_MS: u64 = 60_000;

/// Portal login. Never logged, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        Self::from_parts(Some(login.into()), Some(password.into()))
    }

    /// Builds credentials from optional sources; blank values count as missing.
    pub fn from_parts(
        login: Option<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let login = login.filter(|value| !value.trim().is_empty());
        let password = password.filter(|value| !value.is_empty());

        match (login, password) {
            (Some(login), Some(password)) => Ok(Self { login, password }),
            (login, password) => {
                let mut missing = Vec::new();
                if login.is_none() {
                    missing.push("login");
                }
                if password.is_none() {
                    missing.push("password");
                }
                Err(ConfigError::MissingCredentials(missing.join(" and ")))
            }
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The fixed filter selections for the daily report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportConfiguration {
    /// Id of the report category link in the reports list.
    pub category: String,
    pub report_id: String,
    /// `-1` selects every service.
    pub service_scope: String,
    /// Visible label of the coach entry.
    pub coach: String,
    pub hub: String,
    /// Visible label of the date range entry.
    pub date_range: String,
}

impl Default for ReportConfiguration {
    fn default() -> Self {
        Self {
            category: "3".to_string(),
            report_id: "147".to_string(),
            service_scope: "-1".to_string(),
            coach: "- All -".to_string(),
            hub: "1".to_string(),
            date_range: "Yesterday".to_string(),
        }
    }
}

/// Bounds for every wait in a run, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timeouts {
    pub action_ms: u64,
    pub readiness_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
    pub report_ms: u64,
    pub download_ms: u64,
    pub startup_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            action_ms: 30_000,
            readiness_ms: 30_000,
            poll_interval_ms: 250,
            settle_ms: 10_000,
            report_ms: MIN_REPORT_TIMEOUT_MS,
            download_ms: 60_000,
            startup_ms: 60_000,
        }
    }
}

impl Timeouts {
    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn readiness(&self) -> Duration {
        Duration::from_millis(self.readiness_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Results wait, kept within 15-60 seconds.
    pub fn report(&self) -> Duration {
        Duration::from_millis(
            self.report_ms
                .clamp(MIN_REPORT_TIMEOUT_MS, MAX_REPORT_TIMEOUT_MS),
        )
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn startup(&self) -> Duration {
        Duration::from_millis(self.startup_ms)
    }
}

/// Everything a single run needs. Credentials stay optional here so a missing
/// value is reported by the run itself, before any browser is launched.
#[derive(Clone)]
pub struct RunConfig {
    pub login: Option<String>,
    pub password: Option<String>,
    pub headless: bool,
    pub output_dir: PathBuf,
    pub portal_url: String,
    pub report: ReportConfiguration,
    pub timeouts: Timeouts,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            login: None,
            password: None,
            headless: true,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            report: ReportConfiguration::default(),
            timeouts: Timeouts::default(),
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("login", &self.login)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("headless", &self.headless)
            .field("output_dir", &self.output_dir)
            .field("portal_url", &self.portal_url)
            .field("report", &self.report)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}
