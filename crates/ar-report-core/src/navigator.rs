//! Cascading filter form driver.
//!
//! The report form fills its dropdowns in a chain: choosing a report type
//! loads the coach list, which loads the hubs, which loads the date ranges.
//! [`ReportNavigator`] walks [`NavStep::SEQUENCE`] in order and gates every
//! dependent selection on a readiness predicate instead of a fixed delay.

use ar_report_browser::{
    BrowserError, BrowsingSession, ClickTarget, PollPolicy, wait_for_condition, wait_until_stable,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::auth::AuthenticatedSession;
use crate::config::{ReportConfiguration, Timeouts};
use crate::error::{ReportError, timeout_ms};
use crate::scripts;

const MENU_TOGGLE: &str = "a.header-menu-bar";
const REPORTS_LINK: &str = "a#reports_id";
const REPORT_TYPE_SELECT: &str = "#report_id";
const SERVICE_SELECT: &str = "#report_service_all";
const COACH_SELECT: &str = "#report_coach_id";
const COACH_OVERLAY: &str = "#report_coach_id_chosen";
const HUB_SELECT: &str = "#hub_options";
const DATE_RANGE_SELECT: &str = "#report_date_range";
const DATE_RANGE_OVERLAY: &str = "#report_date_range_chosen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavStep {
    OpenMenu,
    OpenReports,
    SelectCategory,
    SetReportType,
    SetServiceScope,
    ChooseCoach,
    SetHub,
    ChooseDateRange,
    SettleForm,
}

impl NavStep {
    /// Every step, in the only order the portal accepts.
    pub const SEQUENCE: [NavStep; 9] = [
        NavStep::OpenMenu,
        NavStep::OpenReports,
        NavStep::SelectCategory,
        NavStep::SetReportType,
        NavStep::SetServiceScope,
        NavStep::ChooseCoach,
        NavStep::SetHub,
        NavStep::ChooseDateRange,
        NavStep::SettleForm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NavStep::OpenMenu => "open_menu",
            NavStep::OpenReports => "open_reports",
            NavStep::SelectCategory => "select_category",
            NavStep::SetReportType => "set_report_type",
            NavStep::SetServiceScope => "set_service_scope",
            NavStep::ChooseCoach => "choose_coach",
            NavStep::SetHub => "set_hub",
            NavStep::ChooseDateRange => "choose_date_range",
            NavStep::SettleForm => "settle_form",
        }
    }
}

impl fmt::Display for NavStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ReportNavigator<'a> {
    session: &'a dyn BrowsingSession,
    report: &'a ReportConfiguration,
    timeouts: &'a Timeouts,
}

impl<'a> ReportNavigator<'a> {
    pub fn new(
        auth: &AuthenticatedSession<'a>,
        report: &'a ReportConfiguration,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self {
            session: auth.session(),
            report,
            timeouts,
        }
    }

    /// Applies every selection. Stops at the first step that fails.
    pub async fn run(&self) -> Result<(), ReportError> {
        for step in NavStep::SEQUENCE {
            tracing::info!(step = %step, "navigating");
            self.execute(step).await?;
        }
        tracing::info!(report_id = %self.report.report_id, "report form configured");
        Ok(())
    }

    async fn execute(&self, step: NavStep) -> Result<(), ReportError> {
        let report = self.report;
        match step {
            NavStep::OpenMenu => self.click(step, ClickTarget::new(MENU_TOGGLE)).await,
            NavStep::OpenReports => self.click(step, ClickTarget::new(REPORTS_LINK)).await,
            NavStep::SelectCategory => {
                let link = format!(r#"a[id="{}"]"#, report.category);
                self.click(step, ClickTarget::new(link)).await
            }
            NavStep::SetReportType => {
                self.set_value(step, REPORT_TYPE_SELECT, &report.report_id)
                    .await
            }
            NavStep::SetServiceScope => {
                self.set_value(step, SERVICE_SELECT, &report.service_scope)
                    .await
            }
            NavStep::ChooseCoach => {
                self.await_options(step, COACH_SELECT).await?;
                self.choose_from_overlay(step, COACH_OVERLAY, &report.coach)
                    .await
            }
            NavStep::SetHub => {
                self.await_options(step, HUB_SELECT).await?;
                self.set_value(step, HUB_SELECT, &report.hub).await
            }
            NavStep::ChooseDateRange => {
                self.await_options(step, DATE_RANGE_SELECT).await?;
                self.choose_from_overlay(step, DATE_RANGE_OVERLAY, &report.date_range)
                    .await
            }
            NavStep::SettleForm => self.settle(step).await,
        }
    }

    async fn click(&self, step: NavStep, target: ClickTarget) -> Result<(), ReportError> {
        let action = self.timeouts.action();
        self.session
            .click(&target, action)
            .await
            .map_err(|err| step_error(step, err, action))
    }

    /// Sets a select's value directly; the portal's own widget is bypassed for
    /// these controls.
    async fn set_value(&self, step: NavStep, selector: &str, value: &str) -> Result<(), ReportError> {
        let applied = self
            .session
            .evaluate(&scripts::set_value_and_notify(selector, value))
            .await
            .map_err(|err| step_error(step, err, self.timeouts.action()))?;

        if applied != Value::String(value.to_string()) {
            return Err(ReportError::Navigation {
                step,
                source: BrowserError::Command {
                    operation: format!("set {selector}"),
                    message: format!("value {value:?} not accepted (control holds {applied})"),
                },
            });
        }
        tracing::debug!(step = %step, selector, value, "value applied");
        Ok(())
    }

    async fn await_options(&self, step: NavStep, selector: &str) -> Result<(), ReportError> {
        let policy = self.policy(self.timeouts.readiness());
        wait_for_condition(
            self.session,
            step.name(),
            &scripts::options_populated(selector),
            policy,
        )
        .await
        .map_err(|err| step_error(step, err, policy.timeout))
    }

    /// Opens a chosen-style overlay and clicks the entry labelled `label`.
    async fn choose_from_overlay(
        &self,
        step: NavStep,
        container: &str,
        label: &str,
    ) -> Result<(), ReportError> {
        self.click(step, ClickTarget::new(format!("{container} .chosen-single")))
            .await?;
        self.click(
            step,
            ClickTarget::with_text(format!("{container} ul.chosen-results li"), label),
        )
        .await?;
        tracing::debug!(step = %step, label, "overlay entry chosen");
        Ok(())
    }

    /// Waits until the form's dependent controls stop changing between two
    /// consecutive reads.
    async fn settle(&self, step: NavStep) -> Result<(), ReportError> {
        let policy = self.policy(self.timeouts.settle());
        wait_until_stable(self.session, step.name(), &scripts::form_snapshot(), policy)
            .await
            .map(|_| ())
            .map_err(|err| step_error(step, err, policy.timeout))
    }

    fn policy(&self, timeout: Duration) -> PollPolicy {
        PollPolicy::new(self.timeouts.poll_interval(), timeout)
    }
}

fn step_error(step: NavStep, err: BrowserError, bound: Duration) -> ReportError {
    if err.is_timeout() {
        ReportError::NavigationTimeout {
            step,
            timeout_ms: timeout_ms(&err, bound),
        }
    } else {
        ReportError::Navigation { step, source: err }
    }
}
