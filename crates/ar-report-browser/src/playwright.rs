//! Playwright driver.
//!
//! A long-lived Node.js process runs a generated bridge script that owns one
//! Chromium page. Commands go in as one JSON object per stdin line; each
//! command is answered by exactly one stdout line prefixed with
//! [`BRIDGE_MARKER`]. Anything else the script prints is forwarded to the log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::error::{BrowserError, Result};
use crate::session::{
    BrowserLauncher, BrowsingSession, ClickTarget, Download, LaunchOptions, LoadState,
};

const BRIDGE_MARKER: &str = "__AR_REPORT_BRIDGE__=";
/// Extra time granted on top of an operation's own timeout before the bridge
/// is considered hung.
const REPLY_GRACE: Duration = Duration::from_secs(5);
const EVALUATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Grace for bounded evaluations: the bridge enforces the bound itself.
const EVALUATE_GRACE: Duration = Duration::from_millis(50);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeProbe {
    pub node_available: bool,
    pub node_version: Option<String>,
    pub playwright_package_available: bool,
    pub chromium_cache_detected: bool,
    pub ready: bool,
    pub notes: Vec<String>,
}

impl RuntimeProbe {
    fn empty() -> Self {
        Self {
            node_available: false,
            node_version: None,
            playwright_package_available: false,
            chromium_cache_detected: false,
            ready: false,
            notes: Vec::new(),
        }
    }
}

/// Checks that Node.js and the `playwright` package can be used from `cwd`.
pub async fn probe_runtime(cwd: Option<&Path>) -> RuntimeProbe {
    let mut probe = RuntimeProbe::empty();

    let node_probe = run_command_capture("node", &["--version"], cwd, PROBE_TIMEOUT_SECS).await;
    if let Ok(output) = node_probe
        && output.exit_code == 0
    {
        probe.node_available = true;
        probe.node_version = Some(output.stdout.trim().to_string());
    }

    if probe.node_available {
        let playwright_probe = run_command_capture(
            "node",
            &["-e", "require('playwright'); process.exit(0);"],
            cwd,
            PROBE_TIMEOUT_SECS,
        )
        .await;
        probe.playwright_package_available = playwright_probe
            .map(|output| output.exit_code == 0)
            .unwrap_or(false);
    }

    probe.chromium_cache_detected = detect_chromium_cache();
    probe.ready = probe.node_available && probe.playwright_package_available;

    if !probe.node_available {
        probe.notes.push(
            "Node.js not found. Install Node.js 20+ to enable the browser runtime.".to_string(),
        );
    }

    if probe.node_available && !probe.playwright_package_available {
        probe
            .notes
            .push("Playwright npm package not found. Run: npm i playwright".to_string());
    }

    if probe.ready && !probe.chromium_cache_detected {
        probe.notes.push(
            "Chromium browser binary not found in Playwright cache. Run: npx playwright install chromium".to_string(),
        );
    }

    probe
}

fn ensure_probe_ready(probe: &RuntimeProbe) -> Result<()> {
    if !probe.node_available {
        return Err(BrowserError::RuntimeUnavailable(
            "Node.js is required for browser execution".to_string(),
        ));
    }
    if !probe.playwright_package_available {
        return Err(BrowserError::RuntimeUnavailable(
            "Playwright npm package is not available. Install it with: npm i playwright"
                .to_string(),
        ));
    }
    Ok(())
}

/// Launches Chromium through a Playwright bridge process.
#[derive(Debug, Default, Clone)]
pub struct PlaywrightLauncher {
    working_dir: Option<PathBuf>,
}

impl PlaywrightLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory whose `node_modules` provides `playwright`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[async_trait]
impl BrowserLauncher for PlaywrightLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowsingSession>> {
        if let Some(dir) = &self.working_dir
            && !dir.is_dir()
        {
            return Err(BrowserError::RuntimeUnavailable(format!(
                "Invalid working directory: {}",
                dir.display()
            )));
        }

        let probe = probe_runtime(self.working_dir.as_deref()).await;
        for note in &probe.notes {
            tracing::warn!("{note}");
        }
        ensure_probe_ready(&probe)?;

        let session = PlaywrightSession::spawn(options, self.working_dir.as_deref()).await?;
        Ok(Box::new(session))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand {
    Navigate {
        url: String,
        timeout_ms: u64,
    },
    Fill {
        selector: String,
        text: String,
        timeout_ms: u64,
    },
    Click {
        selector: String,
        has_text: Option<String>,
        timeout_ms: u64,
    },
    Evaluate {
        expression: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },
    WaitForLoadState {
        state: LoadState,
        timeout_ms: u64,
    },
    WaitForSelector {
        selector: String,
        timeout_ms: u64,
    },
    CaptureDownload {
        selector: String,
        has_text: Option<String>,
        timeout_ms: u64,
        save_dir: String,
    },
    Close,
}

impl BridgeCommand {
    fn name(&self) -> &'static str {
        match self {
            BridgeCommand::Navigate { .. } => "navigate",
            BridgeCommand::Fill { .. } => "fill",
            BridgeCommand::Click { .. } => "click",
            BridgeCommand::Evaluate { .. } => "evaluate",
            BridgeCommand::WaitForLoadState { .. } => "wait_for_load_state",
            BridgeCommand::WaitForSelector { .. } => "wait_for_selector",
            BridgeCommand::CaptureDownload { .. } => "capture_download",
            BridgeCommand::Close => "close",
        }
    }
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: i64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

#[derive(Debug, Deserialize)]
struct SavedDownload {
    suggested_filename: String,
    path: PathBuf,
}

struct BridgeIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// A browser page driven through the Playwright bridge.
pub struct PlaywrightSession {
    io: Mutex<Option<BridgeIo>>,
    next_id: AtomicU64,
    download_dir: PathBuf,
    // Holds the bridge script and download directory; removed on drop.
    _workspace: TempDir,
}

impl PlaywrightSession {
    async fn spawn(options: &LaunchOptions, cwd: Option<&Path>) -> Result<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("ar-report-browser-")
            .tempdir()?;
        let download_dir = workspace.path().join("downloads");
        std::fs::create_dir_all(&download_dir)?;

        let session_id = Uuid::new_v4().to_string();
        let script_path = workspace.path().join("bridge.mjs");
        std::fs::write(&script_path, build_bridge_script(&session_id, options.headless))?;

        let mut command = Command::new("node");
        command
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrowserError::Transport("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrowserError::Transport("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "ar_report_browser::bridge", "{line}");
                }
            });
        }

        let mut io = BridgeIo {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        tracing::info!(session_id = %session_id, headless = options.headless, "launching browser");
        match read_reply(&mut io, 0, "launch", options.startup_timeout, REPLY_GRACE).await {
            Ok(_) => {}
            Err(err) => {
                let _ = io.child.kill().await;
                return Err(match err {
                    BrowserError::Command { message, .. } => {
                        BrowserError::RuntimeUnavailable(message)
                    }
                    other => other,
                });
            }
        }

        Ok(Self {
            io: Mutex::new(Some(io)),
            next_id: AtomicU64::new(1),
            download_dir,
            _workspace: workspace,
        })
    }

    async fn request(&self, command: BridgeCommand, limit: Duration) -> Result<Value> {
        self.request_with_grace(command, limit, REPLY_GRACE).await
    }

    async fn request_with_grace(
        &self,
        command: BridgeCommand,
        limit: Duration,
        grace: Duration,
    ) -> Result<Value> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut().ok_or(BrowserError::Closed)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let operation = command.name();
        let mut line = serde_json::to_string(&BridgeRequest {
            id,
            command: &command,
        })?;
        line.push('\n');

        tracing::trace!(id, operation, "bridge request");
        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| BrowserError::Transport(format!("write {operation}: {err}")))?;
        io.stdin
            .flush()
            .await
            .map_err(|err| BrowserError::Transport(format!("flush {operation}: {err}")))?;

        read_reply(io, id as i64, operation, limit, grace).await
    }
}

async fn next_reply(io: &mut BridgeIo, id: i64, operation: &str) -> Result<BridgeReply> {
    loop {
        let line = io
            .stdout
            .next_line()
            .await
            .map_err(|err| BrowserError::Transport(format!("read {operation}: {err}")))?;
        let Some(line) = line else {
            return Err(BrowserError::Transport(format!(
                "bridge exited during {operation}"
            )));
        };

        let Some(rest) = line.strip_prefix(BRIDGE_MARKER) else {
            tracing::debug!(target: "ar_report_browser::bridge", "{line}");
            continue;
        };

        let reply: BridgeReply = serde_json::from_str(rest.trim())?;
        if reply.id != id {
            tracing::warn!(expected = id, got = reply.id, "discarding stale bridge reply");
            continue;
        }
        return Ok(reply);
    }
}

async fn read_reply(
    io: &mut BridgeIo,
    id: i64,
    operation: &str,
    limit: Duration,
    grace: Duration,
) -> Result<Value> {
    let reply = match timeout(limit + grace, next_reply(io, id, operation)).await {
        Ok(reply) => reply?,
        Err(_) => return Err(BrowserError::timeout(operation, limit)),
    };

    if reply.ok {
        return Ok(reply.value);
    }

    let message = reply
        .error
        .unwrap_or_else(|| format!("{operation} failed without a message"));
    if reply.timeout {
        Err(BrowserError::timeout(operation, limit))
    } else {
        Err(BrowserError::Command {
            operation: operation.to_string(),
            message,
        })
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl BrowsingSession for PlaywrightSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        tracing::debug!(url, "navigate");
        self.request(
            BridgeCommand::Navigate {
                url: url.to_string(),
                timeout_ms: millis(timeout),
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn fill(&self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        tracing::debug!(selector, "fill");
        self.request(
            BridgeCommand::Fill {
                selector: selector.to_string(),
                text: text.to_string(),
                timeout_ms: millis(timeout),
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn click(&self, target: &ClickTarget, timeout: Duration) -> Result<()> {
        tracing::debug!(%target, "click");
        self.request(
            BridgeCommand::Click {
                selector: target.selector.clone(),
                has_text: target.has_text.clone(),
                timeout_ms: millis(timeout),
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.request(
            BridgeCommand::Evaluate {
                expression: expression.to_string(),
                timeout_ms: None,
            },
            EVALUATE_TIMEOUT,
        )
        .await
    }

    async fn evaluate_within(&self, expression: &str, timeout: Duration) -> Result<Value> {
        self.request_with_grace(
            BridgeCommand::Evaluate {
                expression: expression.to_string(),
                timeout_ms: Some(millis(timeout)),
            },
            timeout,
            EVALUATE_GRACE,
        )
        .await
    }

    async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
        tracing::debug!(state = state.as_str(), "wait for load state");
        self.request(
            BridgeCommand::WaitForLoadState {
                state,
                timeout_ms: millis(timeout),
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        tracing::debug!(selector, "wait for selector");
        self.request(
            BridgeCommand::WaitForSelector {
                selector: selector.to_string(),
                timeout_ms: millis(timeout),
            },
            timeout,
        )
        .await
        .map(|_| ())
    }

    async fn capture_download(&self, trigger: &ClickTarget, timeout: Duration) -> Result<Download> {
        tracing::debug!(%trigger, "capture download");
        let value = self
            .request(
                BridgeCommand::CaptureDownload {
                    selector: trigger.selector.clone(),
                    has_text: trigger.has_text.clone(),
                    timeout_ms: millis(timeout),
                    save_dir: self.download_dir.display().to_string(),
                },
                timeout,
            )
            .await?;

        let saved: SavedDownload = serde_json::from_value(value)?;
        let content = tokio::fs::read(&saved.path).await?;
        if let Err(err) = tokio::fs::remove_file(&saved.path).await {
            tracing::debug!(path = %saved.path.display(), "could not remove bridge download: {err}");
        }

        Ok(Download {
            suggested_filename: saved.suggested_filename,
            content,
        })
    }

    async fn close(&self) -> Result<()> {
        let Some(mut io) = self.io.lock().await.take() else {
            return Ok(());
        };

        let line = serde_json::to_string(&BridgeRequest {
            id: 0,
            command: &BridgeCommand::Close,
        })? + "\n";
        let graceful = io.stdin.write_all(line.as_bytes()).await.is_ok()
            && io.stdin.flush().await.is_ok()
            && timeout(CLOSE_TIMEOUT, io.child.wait()).await.is_ok();

        if !graceful {
            tracing::warn!("browser bridge did not exit cleanly, killing it");
            io.child.kill().await?;
        }
        tracing::info!("browser closed");
        Ok(())
    }
}

fn build_bridge_script(session_id: &str, headless: bool) -> String {
    let session_literal = json!({
        "id": session_id,
        "headless": headless,
    })
    .to_string();

    let mut script = String::new();
    script.push_str("import path from 'node:path';\n");
    script.push_str("import readline from 'node:readline';\n");
    script.push_str("import { createRequire } from 'node:module';\n\n");
    script.push_str(&format!("const BRIDGE_MARKER = '{BRIDGE_MARKER}';\n"));
    script.push_str(&format!("const session = {session_literal};\n\n"));

    script.push_str("function reply(id, body) {\n");
    script.push_str("  process.stdout.write(`${BRIDGE_MARKER}${JSON.stringify({ id, ...body })}\\n`);\n");
    script.push_str("}\n\n");
    script.push_str("function failure(id, error) {\n");
    script.push_str("  const message = error && error.stack ? error.stack : String(error);\n");
    script.push_str("  const timeout = Boolean(error && error.name === 'TimeoutError');\n");
    script.push_str("  process.stderr.write(message + '\\n');\n");
    script.push_str("  reply(id, { ok: false, timeout, error: message });\n");
    script.push_str("}\n\n");

    // Resolve playwright from the working directory rather than the temp
    // directory holding this script.
    script.push_str("let chromium;\n");
    script.push_str("try {\n");
    script.push_str("  const require = createRequire(path.join(process.cwd(), 'bridge.cjs'));\n");
    script.push_str("  ({ chromium } = require('playwright'));\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  failure(0, error);\n");
    script.push_str("  process.exit(1);\n");
    script.push_str("}\n\n");

    script.push_str("let browser;\n");
    script.push_str("let context;\n");
    script.push_str("let page;\n");
    script.push_str("try {\n");
    script.push_str("  browser = await chromium.launch({ headless: session.headless });\n");
    script.push_str("  context = await browser.newContext({ acceptDownloads: true });\n");
    script.push_str("  page = await context.newPage();\n");
    script.push_str("} catch (error) {\n");
    script.push_str("  failure(0, error);\n");
    script.push_str("  await browser?.close().catch(() => {});\n");
    script.push_str("  process.exit(1);\n");
    script.push_str("}\n");
    script.push_str("reply(0, { ok: true, value: session.id });\n\n");

    script.push_str("function expire(operation, ms) {\n");
    script.push_str("  return new Promise((_, reject) => setTimeout(() => {\n");
    script.push_str("    const error = new Error(`${operation}: exceeded ${ms}ms`);\n");
    script.push_str("    error.name = 'TimeoutError';\n");
    script.push_str("    reject(error);\n");
    script.push_str("  }, ms).unref());\n");
    script.push_str("}\n\n");

    script.push_str("function locate(command) {\n");
    script.push_str("  const options = command.has_text ? { hasText: command.has_text } : undefined;\n");
    script.push_str("  return page.locator(command.selector, options).first();\n");
    script.push_str("}\n\n");

    script.push_str("async function execute(command) {\n");
    script.push_str("  const timeout = command.timeout_ms ?? 30000;\n");
    script.push_str("  switch (command.op) {\n");
    script.push_str("    case 'navigate': {\n");
    script.push_str("      await page.goto(command.url, { timeout });\n");
    script.push_str("      return page.url();\n");
    script.push_str("    }\n");
    script.push_str("    case 'fill': {\n");
    script.push_str("      const locator = locate(command);\n");
    script.push_str("      await locator.waitFor({ state: 'visible', timeout });\n");
    script.push_str("      await locator.fill(command.text, { timeout });\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");
    script.push_str("    case 'click': {\n");
    script.push_str("      const locator = locate(command);\n");
    script.push_str("      await locator.waitFor({ state: 'visible', timeout });\n");
    script.push_str("      await locator.click({ timeout });\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");
    script.push_str("    case 'evaluate': {\n");
    script.push_str("      const evaluation = page.evaluate(command.expression);\n");
    script.push_str("      const value = command.timeout_ms == null\n");
    script.push_str("        ? await evaluation\n");
    script.push_str("        : await Promise.race([evaluation, expire('evaluate', timeout)]);\n");
    script.push_str("      return value === undefined ? null : value;\n");
    script.push_str("    }\n");
    script.push_str("    case 'wait_for_load_state': {\n");
    script.push_str("      await page.waitForLoadState(command.state, { timeout });\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");
    script.push_str("    case 'wait_for_selector': {\n");
    script.push_str("      await page.waitForSelector(command.selector, { timeout });\n");
    script.push_str("      return null;\n");
    script.push_str("    }\n");
    script.push_str("    case 'capture_download': {\n");
    script.push_str("      const [download] = await Promise.all([\n");
    script.push_str("        page.waitForEvent('download', { timeout }),\n");
    script.push_str("        locate(command).click({ timeout }),\n");
    script.push_str("      ]);\n");
    script.push_str("      const suggested = download.suggestedFilename();\n");
    script.push_str("      const target = path.join(command.save_dir, `${command.id}-${path.basename(suggested) || 'download'}`);\n");
    script.push_str("      await download.saveAs(target);\n");
    script.push_str("      const failed = await download.failure();\n");
    script.push_str("      if (failed) {\n");
    script.push_str("        throw new Error(`Download failed: ${failed}`);\n");
    script.push_str("      }\n");
    script.push_str("      return { suggested_filename: suggested, path: target };\n");
    script.push_str("    }\n");
    script.push_str("    default:\n");
    script.push_str("      throw new Error(`Unsupported bridge op: ${command.op}`);\n");
    script.push_str("  }\n");
    script.push_str("}\n\n");

    script.push_str("async function shutdown() {\n");
    script.push_str("  await context?.close().catch(() => {});\n");
    script.push_str("  await browser?.close().catch(() => {});\n");
    script.push_str("}\n\n");

    script.push_str("const input = readline.createInterface({ input: process.stdin, crlfDelay: Infinity });\n");
    script.push_str("for await (const line of input) {\n");
    script.push_str("  if (!line.trim()) continue;\n");
    script.push_str("  let command;\n");
    script.push_str("  try {\n");
    script.push_str("    command = JSON.parse(line);\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    failure(-1, error);\n");
    script.push_str("    continue;\n");
    script.push_str("  }\n");
    script.push_str("  if (command.op === 'close') {\n");
    script.push_str("    await shutdown();\n");
    script.push_str("    reply(command.id, { ok: true, value: null });\n");
    script.push_str("    process.exit(0);\n");
    script.push_str("  }\n");
    script.push_str("  try {\n");
    script.push_str("    const value = await execute(command);\n");
    script.push_str("    reply(command.id, { ok: true, value });\n");
    script.push_str("  } catch (error) {\n");
    script.push_str("    failure(command.id, error);\n");
    script.push_str("  }\n");
    script.push_str("}\n");
    script.push_str("await shutdown();\n");

    script
}

struct CommandCapture {
    exit_code: i32,
    stdout: String,
}

async fn run_command_capture(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout_secs: u64,
) -> Result<CommandCapture> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = match timeout(Duration::from_secs(timeout_secs), command.output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(BrowserError::timeout(
                format!("{program} probe"),
                Duration::from_secs(timeout_secs),
            ));
        }
    };

    Ok(CommandCapture {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
    })
}

fn detect_chromium_cache() -> bool {
    if let Ok(path) = std::env::var("PLAYWRIGHT_BROWSERS_PATH") {
        let parsed = PathBuf::from(path);
        if parsed.exists() {
            return true;
        }
    }

    let mut candidates = Vec::new();

    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(&home).join(".cache/ms-playwright"));
        candidates.push(PathBuf::from(&home).join("Library/Caches/ms-playwright"));
    }

    if let Ok(user_profile) = std::env::var("USERPROFILE") {
        candidates.push(PathBuf::from(user_profile).join("AppData/Local/ms-playwright"));
    }

    candidates.into_iter().any(|path| path.exists())
}
