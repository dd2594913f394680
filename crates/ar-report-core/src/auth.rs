//! Portal sign-in.

use ar_report_browser::{BrowsingSession, ClickTarget, LoadState};
use serde_json::Value;

use crate::config::{Credentials, Timeouts};
use crate::error::AuthError;
use crate::scripts;

pub const LOGIN_FIELD: &str = r#"input[name="login"]"#;
pub const PASSWORD_FIELD: &str = r#"input[name="password"]"#;
pub const LOGIN_BUTTON: &str = "input#login_button";

/// A session that has passed the portal's login form.
pub struct AuthenticatedSession<'a> {
    session: &'a dyn BrowsingSession,
}

impl<'a> AuthenticatedSession<'a> {
    pub fn session(&self) -> &'a dyn BrowsingSession {
        self.session
    }
}

pub struct SessionManager<'a> {
    portal_url: &'a str,
    timeouts: &'a Timeouts,
}

impl<'a> SessionManager<'a> {
    pub fn new(portal_url: &'a str, timeouts: &'a Timeouts) -> Self {
        Self {
            portal_url,
            timeouts,
        }
    }

    /// Signs in and waits for the portal to go network-idle. No retries.
    pub async fn authenticate<'s>(
        &self,
        session: &'s dyn BrowsingSession,
        credentials: &Credentials,
    ) -> Result<AuthenticatedSession<'s>, AuthError> {
        let action = self.timeouts.action();
        tracing::info!(portal = self.portal_url, login = credentials.login(), "signing in");

        session
            .navigate(self.portal_url, action)
            .await
            .map_err(AuthError::Unreachable)?;
        session
            .fill(LOGIN_FIELD, credentials.login(), action)
            .await
            .map_err(AuthError::FormMissing)?;
        session
            .fill(PASSWORD_FIELD, credentials.password(), action)
            .await
            .map_err(AuthError::FormMissing)?;
        session
            .click(&ClickTarget::new(LOGIN_BUTTON), action)
            .await
            .map_err(AuthError::FormMissing)?;
        session
            .wait_for_load_state(LoadState::NetworkIdle, action)
            .await
            .map_err(AuthError::NotSettled)?;

        // A rejected login re-renders the same form.
        let still_on_login = session
            .evaluate(&scripts::element_present(LOGIN_FIELD))
            .await
            .map_err(AuthError::Browser)?;
        if still_on_login == Value::Bool(true) {
            return Err(AuthError::Rejected);
        }

        tracing::info!("signed in");
        Ok(AuthenticatedSession { session })
    }
}
