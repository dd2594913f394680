//! Condition polling on top of [`BrowsingSession::evaluate`].
//!
//! The portal populates its dropdowns asynchronously, so every dependent step
//! waits on a predicate instead of sleeping for a fixed time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::error::{BrowserError, Result};
use crate::session::BrowsingSession;

/// Least time a single evaluation is given, even right at the deadline.
const MIN_EVALUATE_BUDGET: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollPolicy {
    #[serde(with = "crate::session::duration_ms")]
    pub interval: Duration,
    #[serde(with = "crate::session::duration_ms")]
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            timeout,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), Duration::from_secs(30))
    }
}

/// Polls `predicate` until it evaluates to `true`.
///
/// Script errors while polling (element not rendered yet) count as "not yet";
/// transport failures abort immediately. Each evaluation is bounded by the
/// time left before the deadline.
pub async fn wait_for_condition(
    session: &dyn BrowsingSession,
    label: &str,
    predicate: &str,
    policy: PollPolicy,
) -> Result<()> {
    let deadline = Instant::now() + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match session
            .evaluate_within(predicate, evaluate_budget(deadline))
            .await
        {
            Ok(Value::Bool(true)) => {
                tracing::debug!(label, attempts, "condition satisfied");
                return Ok(());
            }
            Ok(_) => {}
            Err(BrowserError::Command { message, .. }) => {
                tracing::debug!(label, attempts, %message, "condition not evaluable yet");
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(label, attempts, "predicate evaluation hung past timeout");
                return Err(BrowserError::timeout(label, policy.timeout));
            }
            Err(err) => return Err(err),
        }

        if !pause_until_next_poll(deadline, policy.interval).await {
            tracing::warn!(label, attempts, "condition not met before timeout");
            return Err(BrowserError::timeout(label, policy.timeout));
        }
    }
}

/// Polls `snapshot` until two consecutive reads return the same value.
pub async fn wait_until_stable(
    session: &dyn BrowsingSession,
    label: &str,
    snapshot: &str,
    policy: PollPolicy,
) -> Result<Value> {
    let deadline = Instant::now() + policy.timeout;
    let mut previous: Option<Value> = None;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let current = match session
            .evaluate_within(snapshot, evaluate_budget(deadline))
            .await
        {
            Ok(value) => Some(value),
            Err(BrowserError::Command { message, .. }) => {
                tracing::debug!(label, attempts, %message, "snapshot not evaluable yet");
                None
            }
            Err(err) if err.is_timeout() => {
                tracing::warn!(label, attempts, "snapshot evaluation hung past timeout");
                return Err(BrowserError::timeout(label, policy.timeout));
            }
            Err(err) => return Err(err),
        };

        let stable = matches!((&previous, &current), (Some(before), Some(now)) if before == now);
        if stable {
            tracing::debug!(label, attempts, "state stable");
            return Ok(current.unwrap_or(Value::Null));
        }
        previous = current;

        if !pause_until_next_poll(deadline, policy.interval).await {
            tracing::warn!(label, attempts, "state still changing at timeout");
            return Err(BrowserError::timeout(label, policy.timeout));
        }
    }
}

fn evaluate_budget(deadline: Instant) -> Duration {
    deadline
        .saturating_duration_since(Instant::now())
        .max(MIN_EVALUATE_BUDGET)
}

/// Sleeps for one interval, clipped to the deadline. Returns `false` once the
/// deadline has passed.
async fn pause_until_next_poll(deadline: Instant, interval: Duration) -> bool {
    let now = Instant::now();
    if now >= deadline {
        return false;
    }
    sleep(interval.min(deadline - now)).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ClickTarget, Download, LoadState};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns queued values in order, repeating the last one.
    struct ScriptedEval {
        values: Mutex<Vec<Result<Value>>>,
        calls: Mutex<u32>,
        hang: bool,
    }

    impl ScriptedEval {
        fn new(values: Vec<Result<Value>>) -> Self {
            Self {
                values: Mutex::new(values),
                calls: Mutex::new(0),
                hang: false,
            }
        }

        /// A page whose evaluations never return.
        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new(vec![Ok(json!(true))])
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BrowsingSession for ScriptedEval {
        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn fill(&self, _selector: &str, _text: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn click(&self, _target: &ClickTarget, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn evaluate(&self, _expression: &str) -> Result<Value> {
            *self.calls.lock().unwrap() += 1;
            if self.hang {
                std::future::pending::<()>().await;
            }
            let mut values = self.values.lock().unwrap();
            if values.len() > 1 {
                values.remove(0)
            } else {
                match &values[0] {
                    Ok(value) => Ok(value.clone()),
                    Err(_) => Err(BrowserError::Transport("scripted".to_string())),
                }
            }
        }

        async fn wait_for_load_state(&self, _state: LoadState, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn capture_download(
            &self,
            _trigger: &ClickTarget,
            _timeout: Duration,
        ) -> Result<Download> {
            Err(BrowserError::Closed)
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn fast(timeout_ms: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(5), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn condition_resolves_after_options_populate() {
        let session = ScriptedEval::new(vec![Ok(json!(false)), Ok(json!(false)), Ok(json!(true))]);
        wait_for_condition(&session, "coach options", "true", fast(1_000))
            .await
            .unwrap();
        assert_eq!(session.calls(), 3);
    }

    #[tokio::test]
    async fn condition_times_out_when_never_true() {
        let session = ScriptedEval::new(vec![Ok(json!(false))]);
        let err = wait_for_condition(&session, "coach options", "false", fast(40))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("coach options"));
    }

    #[tokio::test]
    async fn script_errors_are_retried() {
        let session = ScriptedEval::new(vec![
            Err(BrowserError::Command {
                operation: "evaluate".to_string(),
                message: "el is null".to_string(),
            }),
            Ok(json!(true)),
        ]);
        wait_for_condition(&session, "hub options", "x", fast(1_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn transport_errors_abort_polling() {
        let session = ScriptedEval::new(vec![Err(BrowserError::Transport("gone".to_string()))]);
        let err = wait_for_condition(&session, "hub options", "x", fast(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Transport(_)));
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test]
    async fn stable_after_two_identical_snapshots() {
        let session = ScriptedEval::new(vec![
            Ok(json!([["hub_options", "1", 3]])),
            Ok(json!([["hub_options", "1", 4]])),
            Ok(json!([["hub_options", "1", 4]])),
        ]);
        let value = wait_until_stable(&session, "form", "x", fast(1_000))
            .await
            .unwrap();
        assert_eq!(value, json!([["hub_options", "1", 4]]));
        assert_eq!(session.calls(), 3);
    }

    #[tokio::test]
    async fn unstable_snapshot_times_out() {
        let session = ScriptedEval::new(
            (0..1_000)
                .map(|i| Ok(json!(i)))
                .collect::<Vec<Result<Value>>>(),
        );
        let err = wait_until_stable(&session, "form", "x", fast(30))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn hung_predicate_is_bounded_by_poll_timeout() {
        let session = ScriptedEval::hanging();
        let started = std::time::Instant::now();

        let err = wait_for_condition(&session, "coach options", "x", fast(80))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            &err,
            BrowserError::Timeout { operation, timeout_ms: 80 } if operation == "coach options"
        ));
        assert_eq!(session.calls(), 1);
    }

    #[tokio::test]
    async fn hung_snapshot_is_bounded_by_settle_timeout() {
        let session = ScriptedEval::hanging();
        let started = std::time::Instant::now();

        let err = wait_until_stable(&session, "form", "x", fast(80))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("form"));
    }
}
