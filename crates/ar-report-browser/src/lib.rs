//! Browser runtime for ar-report.
//!
//! This crate provides the page-level automation surface the report pipeline
//! is written against:
//! - The [`BrowsingSession`] contract (navigate, fill, click, evaluate, waits,
//!   download capture, close) and a [`BrowserLauncher`] to create sessions
//! - Readiness polling ([`wait_for_condition`], [`wait_until_stable`])
//! - A Playwright-backed implementation driven through a Node.js bridge

mod error;
mod playwright;
mod session;
mod wait;

pub use error::{BrowserError, Result};
pub use playwright::{PlaywrightLauncher, PlaywrightSession, RuntimeProbe, probe_runtime};
pub use session::{
    BrowserLauncher, BrowsingSession, ClickTarget, Download, LaunchOptions, LoadState,
};
pub use wait::{PollPolicy, wait_for_condition, wait_until_stable};
