//! Scripted stand-in for the portal, shared by the integration tests.

#![allow(dead_code)]

use ar_report_browser::{
    BrowserError, BrowserLauncher, BrowsingSession, ClickTarget, Download, LaunchOptions,
    LoadState, Result,
};
use ar_report_core::{RunConfig, Timeouts};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COACH_SELECT: &str = "#report_coach_id";
pub const HUB_SELECT: &str = "#hub_options";
pub const DATE_RANGE_SELECT: &str = "#report_date_range";

/// Behaviour knobs for the fake portal. The default is a portal where every
/// step succeeds on the first poll.
#[derive(Debug, Clone)]
pub struct PortalScript {
    pub download: Download,
    /// Selects whose option set never grows past the placeholder.
    pub never_populated: HashSet<&'static str>,
    pub reject_login: bool,
    /// The login page renders without its form fields.
    pub login_form_missing: bool,
    /// Network idle is never reached after signing in.
    pub never_settles: bool,
    pub results_render: bool,
    pub download_times_out: bool,
}

impl Default for PortalScript {
    fn default() -> Self {
        Self {
            download: Download {
                suggested_filename: "Report March 2024 15.csv".to_string(),
                content: b"pnr,route,fare\n1001,HYD-BLR,950\n1002,HYD-VJA,620\n".to_vec(),
            },
            never_populated: HashSet::new(),
            reject_login: false,
            login_form_missing: false,
            never_settles: false,
            results_render: true,
            download_times_out: false,
        }
    }
}

#[derive(Default)]
pub struct FakePortal {
    script: PortalScript,
    events: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl FakePortal {
    pub fn new(script: PortalScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            events: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    /// Index of the first event equal to `event`; panics when absent.
    pub fn index_of(&self, event: &str) -> usize {
        self.position(event)
            .unwrap_or_else(|| panic!("event {event:?} not recorded in {:?}", self.events()))
    }

    fn select_in(expression: &str) -> Option<&'static str> {
        [COACH_SELECT, HUB_SELECT, DATE_RANGE_SELECT]
            .into_iter()
            .find(|selector| expression.contains(&format!("\"{selector}\"")))
    }
}

/// Pulls the JSON string literal assigned by a set-value script.
fn assigned_value(expression: &str) -> Option<String> {
    let start = expression.find("el.value = ")? + "el.value = ".len();
    let rest = &expression[start..];
    let end = rest.find(';')?;
    serde_json::from_str(&rest[..end]).ok()
}

fn assigned_selector(expression: &str) -> Option<String> {
    let start = expression.find("document.querySelector(")? + "document.querySelector(".len();
    let rest = &expression[start..];
    let end = rest.find(')')?;
    serde_json::from_str(&rest[..end]).ok()
}

/// Session handle handed out by [`FakeLauncher`]; all handles share one portal.
pub struct PortalSession(pub Arc<FakePortal>);

#[async_trait]
impl BrowsingSession for PortalSession {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.0.record(format!("navigate {url}"));
        Ok(())
    }

    async fn fill(&self, selector: &str, _text: &str, _timeout: Duration) -> Result<()> {
        self.0.record(format!("fill {selector}"));
        if self.0.script.login_form_missing {
            return Err(BrowserError::Command {
                operation: "fill".to_string(),
                message: format!("no element matches {selector}"),
            });
        }
        Ok(())
    }

    async fn click(&self, target: &ClickTarget, _timeout: Duration) -> Result<()> {
        self.0.record(format!("click {target}"));
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let portal = &self.0;

        if expression.contains("el.options.length > 1") {
            let select = FakePortal::select_in(expression).unwrap_or("unknown");
            portal.record(format!("poll {select}"));
            return Ok(json!(!portal.script.never_populated.contains(select)));
        }

        if expression.contains("dispatchEvent") {
            let selector = assigned_selector(expression).unwrap_or_default();
            let value = assigned_value(expression).unwrap_or_default();
            portal.record(format!("set {selector}={value}"));
            return Ok(Value::String(value));
        }

        if expression.contains("querySelectorAll('select')") {
            portal.record("snapshot");
            return Ok(json!([["hub_options", "1", 4], ["report_date_range", "yesterday", 6]]));
        }

        if expression.contains("!== null") {
            return Ok(json!(portal.script.reject_login));
        }

        Err(BrowserError::Command {
            operation: "evaluate".to_string(),
            message: format!("unexpected expression: {expression}"),
        })
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        self.0.record(format!("load_state {}", state.as_str()));
        if self.0.script.never_settles {
            return Err(BrowserError::timeout("wait_for_load_state", timeout));
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.0.record(format!("wait {selector}"));
        if self.0.script.results_render {
            Ok(())
        } else {
            Err(BrowserError::timeout("wait_for_selector", timeout))
        }
    }

    async fn capture_download(&self, trigger: &ClickTarget, timeout: Duration) -> Result<Download> {
        self.0.record(format!("download {trigger}"));
        if self.0.script.download_times_out {
            return Err(BrowserError::timeout("capture_download", timeout));
        }
        Ok(self.0.script.download.clone())
    }

    async fn close(&self) -> Result<()> {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.record("close");
        Ok(())
    }
}

pub struct FakeLauncher {
    pub portal: Arc<FakePortal>,
    launches: AtomicUsize,
    fail_launch: bool,
}

impl FakeLauncher {
    pub fn new(portal: Arc<FakePortal>) -> Self {
        Self {
            portal,
            launches: AtomicUsize::new(0),
            fail_launch: false,
        }
    }

    pub fn failing(portal: Arc<FakePortal>) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(portal)
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn BrowsingSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(BrowserError::RuntimeUnavailable(
                "Node.js is required for browser execution".to_string(),
            ));
        }
        Ok(Box::new(PortalSession(self.portal.clone())))
    }
}

pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        action_ms: 100,
        readiness_ms: 60,
        poll_interval_ms: 5,
        settle_ms: 200,
        report_ms: 15_000,
        download_ms: 100,
        startup_ms: 100,
    }
}

pub fn run_config(output_dir: &Path) -> RunConfig {
    RunConfig {
        login: Some("ops@example.com".to_string()),
        password: Some("s3cret".to_string()),
        output_dir: output_dir.to_path_buf(),
        portal_url: "https://portal.test/".to_string(),
        timeouts: fast_timeouts(),
        ..RunConfig::default()
    }
}

/// Names of regular files in `dir`, sorted; empty when `dir` is missing.
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
