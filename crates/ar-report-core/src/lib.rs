//! Daily report retrieval for the AR operations portal.
//!
//! A run signs in, walks the report filter form, submits it, captures the CSV
//! download, shifts the date in its filename back one day and stores it in
//! the output directory. Browser access goes through
//! [`ar_report_browser::BrowsingSession`], so every stage can run against a
//! scripted session in tests.

pub mod auth;
pub mod capture;
pub mod config;
pub mod error;
pub mod navigator;
pub mod pipeline;
pub mod rename;
pub mod scripts;
pub mod store;
pub mod trigger;

pub use auth::{AuthenticatedSession, SessionManager};
pub use capture::DownloadCapture;
pub use config::{Credentials, ReportConfiguration, RunConfig, Timeouts};
pub use error::{AuthError, ConfigError, ReportError, StorageError};
pub use navigator::{NavStep, ReportNavigator};
pub use pipeline::{Artifact, run};
pub use rename::{FilenameParseFailure, Renamed, rename};
pub use store::ArtifactStore;
pub use trigger::{ReportSurface, ReportTrigger};
