use ar_report_browser::{BrowsingSession, ClickTarget, Download};
use std::time::Duration;

use crate::error::{ReportError, timeout_ms};

const FALLBACK_FILENAME: &str = "report.csv";

/// Scopes a download expectation around a single click.
pub struct DownloadCapture<'a> {
    session: &'a dyn BrowsingSession,
    timeout: Duration,
}

impl<'a> DownloadCapture<'a> {
    pub fn new(session: &'a dyn BrowsingSession, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    pub async fn capture(&self, trigger: &ClickTarget) -> Result<Download, ReportError> {
        tracing::info!(trigger = %trigger, "waiting for download");
        let mut download = self
            .session
            .capture_download(trigger, self.timeout)
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ReportError::DownloadTimeout {
                        timeout_ms: timeout_ms(&err, self.timeout),
                    }
                } else {
                    ReportError::Download(err)
                }
            })?;

        if download.suggested_filename.trim().is_empty() {
            tracing::warn!("download has no suggested filename, using {FALLBACK_FILENAME}");
            download.suggested_filename = FALLBACK_FILENAME.to_string();
        }

        tracing::info!(
            filename = %download.suggested_filename,
            bytes = download.content.len(),
            "download complete"
        );
        Ok(download)
    }
}
