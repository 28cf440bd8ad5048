//! Out-of-band control of live telephony calls.
//!
//! The relay never hangs up by closing the media stream; it asks the
//! telephony provider to end the call so any audio still buffered on the
//! provider side finishes playing first.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

/// Seconds of silence Twilio plays before dropping the line.
pub const HANGUP_PAUSE_SECS: u32 = 4;

/// Twilio's status string for a call that is currently connected.
pub const STATUS_IN_PROGRESS: &str = "in-progress";

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, thiserror::Error)]
pub enum CallControlError {
    #[error("call-control request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("call-control API rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A mutation pushed to a live call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallUpdate {
    /// Replace the call's instructions with a TwiML document.
    Twiml(String),
    /// Mark the call completed, ending it immediately.
    Complete,
}

impl CallUpdate {
    /// Pause for [`HANGUP_PAUSE_SECS`] and then hang up.
    pub fn pause_then_hangup() -> Self {
        Self::Twiml(format!(
            r#"<Response><Pause length="{HANGUP_PAUSE_SECS}"/><Hangup/></Response>"#
        ))
    }

    fn form_params(&self) -> [(&'static str, &str); 1] {
        match self {
            Self::Twiml(twiml) => [("Twiml", twiml.as_str())],
            Self::Complete => [("Status", "completed")],
        }
    }
}

/// The call-control operations the relay depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Returns the provider's current status string for the call.
    async fn fetch_status(&self, call_sid: &str) -> Result<String, CallControlError>;

    /// Applies `update` to the call.
    async fn update(&self, call_sid: &str, update: CallUpdate) -> Result<(), CallControlError>;
}

/// What happened when the relay tried to end a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangupOutcome {
    /// No call identifier was known for the session.
    Skipped,
    /// The call was live and has been told to pause and hang up.
    HungUp,
    /// The call was no longer live and has been marked completed.
    Completed,
    /// The provider could not be reached or rejected the request.
    Failed,
}

/// Ends the call identified by `call_sid`.
///
/// Never returns an error: every failure is logged and reported as
/// [`HangupOutcome::Failed`] so the caller can finish its own teardown.
pub async fn end_call(control: &dyn CallControl, call_sid: Option<&str>) -> HangupOutcome {
    let Some(call_sid) = call_sid else {
        warn!("No call SID for this session; leaving the call to end on its own.");
        return HangupOutcome::Skipped;
    };

    match try_end_call(control, call_sid).await {
        Ok(outcome) => {
            info!(%call_sid, ?outcome, "Call termination requested.");
            outcome
        }
        Err(e) => {
            warn!(%call_sid, error = %e, "Failed to end call.");
            HangupOutcome::Failed
        }
    }
}

async fn try_end_call(
    control: &dyn CallControl,
    call_sid: &str,
) -> Result<HangupOutcome, CallControlError> {
    let status = control.fetch_status(call_sid).await?;
    if status == STATUS_IN_PROGRESS {
        control
            .update(call_sid, CallUpdate::pause_then_hangup())
            .await?;
        Ok(HangupOutcome::HungUp)
    } else {
        info!(%call_sid, %status, "Call is not in progress; marking it completed.");
        control.update(call_sid, CallUpdate::Complete).await?;
        Ok(HangupOutcome::Completed)
    }
}

#[derive(Deserialize)]
struct CallResource {
    status: String,
}

/// [`CallControl`] backed by the Twilio REST API.
pub struct TwilioCallControl {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: SecretString,
}

impl TwilioCallControl {
    /// Creates a client for the given Twilio account.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL of the REST API, normally [`DEFAULT_TWILIO_API_BASE`].
    /// * `account_sid` - The account SID, also used as the basic-auth user.
    /// * `auth_token` - The account auth token.
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: SecretString,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            account_sid: account_sid.into(),
            auth_token,
        }
    }

    fn call_url(&self, call_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls/{}.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid,
            call_sid
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CallControlError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CallControlError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn fetch_status(&self, call_sid: &str) -> Result<String, CallControlError> {
        let response = self
            .client
            .get(self.call_url(call_sid))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .send()
            .await?;
        let call: CallResource = Self::check(response).await?.json().await?;
        Ok(call.status)
    }

    async fn update(&self, call_sid: &str, update: CallUpdate) -> Result<(), CallControlError> {
        let response = self
            .client
            .post(self.call_url(call_sid))
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&update.form_params())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
