//! Platform capability handle. Exactly one provider is bound to a session at
//! construction and never swapped.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::browser::{BrowserSession, Page};
use crate::config::SessionParams;
use crate::state_machine::MeetingEndReason;

/// Platform-specific identity of a meeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRef {
    pub meeting_id: String,
    pub password: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid meeting url: {0}")]
    InvalidMeetingUrl(String),
    #[error("cannot join meeting: {0}")]
    CannotJoinMeeting(String),
    #[error("bot was not accepted into the meeting")]
    BotNotAccepted,
    #[error("meeting requires a signed-in account")]
    LoginRequired,
    #[error("join cancelled")]
    Cancelled,
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// End reason this failure maps to, if it has a dedicated one.
    pub fn end_reason(&self) -> Option<MeetingEndReason> {
        match self {
            Self::InvalidMeetingUrl(_) => Some(MeetingEndReason::InvalidMeetingUrl),
            Self::CannotJoinMeeting(_) => Some(MeetingEndReason::CannotJoinMeeting),
            Self::BotNotAccepted => Some(MeetingEndReason::BotNotAccepted),
            Self::LoginRequired => Some(MeetingEndReason::LoginRequired),
            Self::Cancelled | Self::Navigation(_) | Self::Other(_) => None,
        }
    }
}

/// Polled by the provider during a join; returning true aborts the join.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Called by the provider the moment the bot is admitted.
pub type JoinNotifier = Arc<dyn Fn() + Send + Sync>;

#[async_trait]
pub trait MeetingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn parse_meeting_url(&self, url: &str) -> Result<MeetingRef, ProviderError>;

    fn meeting_link(&self, meeting: &MeetingRef, bot_name: &str) -> String;

    async fn open_meeting_page(
        &self,
        browser: Arc<dyn BrowserSession>,
        link: &str,
        streaming_input: Option<&str>,
    ) -> Result<Arc<dyn Page>, ProviderError>;

    /// Resolves once the bot is in the call. `on_join_success` may fire before
    /// the future resolves.
    async fn join_meeting(
        &self,
        page: Arc<dyn Page>,
        params: &SessionParams,
        cancel_check: CancelCheck,
        on_join_success: JoinNotifier,
    ) -> Result<(), ProviderError>;

    /// Whether the call has ended for the bot.
    async fn find_end_meeting(&self, page: Arc<dyn Page>) -> Result<bool, ProviderError>;

    /// Leave the call. Best-effort.
    async fn close_meeting(&self, page: Arc<dyn Page>);
}
