use ar_report_browser::{BrowsingSession, ClickTarget};
use tokio::time::Instant;

use crate::config::Timeouts;
use crate::error::ReportError;

pub const SUBMIT_BUTTON: &str = r#"input[type="submit"][value="Run Report"]"#;
pub const RESULTS_TABLE: &str = "table#report_results";
pub const CSV_LINK: &str = "a.btn.btn-primary.hide_for_print";
pub const CSV_LINK_TEXT: &str = "Show Detailed View (CSV)";

/// The rendered results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSurface {
    pub csv_link: ClickTarget,
}

pub struct ReportTrigger<'a> {
    session: &'a dyn BrowsingSession,
    timeouts: &'a Timeouts,
}

impl<'a> ReportTrigger<'a> {
    pub fn new(session: &'a dyn BrowsingSession, timeouts: &'a Timeouts) -> Self {
        Self { session, timeouts }
    }

    /// Runs the report and waits for both the results table and the CSV link,
    /// sharing one deadline.
    pub async fn submit(&self) -> Result<ReportSurface, ReportError> {
        self.session
            .click(&ClickTarget::new(SUBMIT_BUTTON), self.timeouts.action())
            .await
            .map_err(ReportError::Report)?;
        tracing::info!("report submitted, waiting for results");

        let limit = self.timeouts.report();
        let deadline = Instant::now() + limit;
        for selector in [RESULTS_TABLE, CSV_LINK] {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.session.wait_for_selector(selector, remaining).await {
                Ok(()) => {}
                Err(err) if err.is_timeout() => {
                    return Err(ReportError::ReportTimeout {
                        waiting_for: selector.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    });
                }
                Err(err) => return Err(ReportError::Report(err)),
            }
        }

        tracing::info!("report results rendered");
        Ok(ReportSurface {
            csv_link: ClickTarget::with_text(CSV_LINK, CSV_LINK_TEXT),
        })
    }
}
