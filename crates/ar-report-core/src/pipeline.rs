//! One end-to-end report run.

use ar_report_browser::{BrowserLauncher, BrowsingSession, LaunchOptions};
use serde::Serialize;
use std::path::PathBuf;

use crate::auth::SessionManager;
use crate::capture::DownloadCapture;
use crate::config::{Credentials, RunConfig};
use crate::error::ReportError;
use crate::navigator::ReportNavigator;
use crate::rename::rename;
use crate::store::ArtifactStore;
use crate::trigger::ReportTrigger;

/// The file a successful run delivers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    /// Name the portal suggested for the download.
    pub original_name: String,
    /// Whether the date token was found and shifted.
    pub renamed: bool,
    pub size: u64,
}

/// Runs the whole report flow once.
///
/// Credentials and the output directory are checked before anything is
/// launched. Once a browser is up, every stage runs inside one failure
/// boundary and the browser is closed afterwards whatever the outcome.
pub async fn run(config: &RunConfig, launcher: &dyn BrowserLauncher) -> Result<Artifact, ReportError> {
    let credentials = Credentials::from_parts(config.login.clone(), config.password.clone())?;
    let store = ArtifactStore::new(&config.output_dir);
    store.prepare()?;

    let options = LaunchOptions {
        headless: config.headless,
        startup_timeout: config.timeouts.startup(),
    };
    let session = launcher
        .launch(&options)
        .await
        .map_err(ReportError::Launch)?;

    let outcome = run_stages(session.as_ref(), config, &credentials, &store).await;

    if let Err(err) = session.close().await {
        tracing::warn!("failed to close browser: {err}");
    }

    match &outcome {
        Ok(artifact) => tracing::info!(
            path = %artifact.path.display(),
            renamed = artifact.renamed,
            bytes = artifact.size,
            "run complete"
        ),
        Err(err) => tracing::error!(kind = err.kind(), "run failed: {err}"),
    }
    outcome
}

async fn run_stages(
    session: &dyn BrowsingSession,
    config: &RunConfig,
    credentials: &Credentials,
    store: &ArtifactStore,
) -> Result<Artifact, ReportError> {
    let timeouts = &config.timeouts;

    let authenticated = SessionManager::new(&config.portal_url, timeouts)
        .authenticate(session, credentials)
        .await?;
    ReportNavigator::new(&authenticated, &config.report, timeouts)
        .run()
        .await?;
    let surface = ReportTrigger::new(session, timeouts).submit().await?;
    let download = DownloadCapture::new(session, timeouts.download())
        .capture(&surface.csv_link)
        .await?;

    let renamed = rename(&download.suggested_filename);
    if let Some(failure) = &renamed.failure {
        tracing::warn!(
            filename = %download.suggested_filename,
            "{failure}, keeping the original name"
        );
    }

    let path = store.store(&download, &renamed.file_name)?;
    Ok(Artifact {
        path,
        file_name: renamed.file_name,
        original_name: download.suggested_filename,
        renamed: renamed.matched,
        size: download.content.len() as u64,
    })
}
