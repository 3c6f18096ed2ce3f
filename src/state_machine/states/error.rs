use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{emit_event_within, now_ms, StateHandler};
use crate::events::BotEvent;
use crate::state_machine::constants::ERROR_NOTIFY_TIMEOUT;
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, StateTransition};

/// Reports the failure and always hands over to Cleanup.
pub struct ErrorState;

#[async_trait]
impl StateHandler for ErrorState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Error
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        let failure = ctx.status().error();
        let end_reason = ctx.status().end_reason();
        let message = failure
            .as_ref()
            .map(|f| f.message.clone())
            .or_else(|| ctx.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string());

        if let (Some(snapshots), Some(page)) = (ctx.snapshot_service(), ctx.page.clone()) {
            tokio::spawn(async move {
                snapshots
                    .capture(page.as_ref(), "error_state_dom_capture")
                    .await;
            });
        }

        match end_reason {
            Some(reason) => {
                error!(
                    "Meeting error occurred: reason={} message={} meeting_url={} bot_name={} bot_uuid={}",
                    reason,
                    message,
                    ctx.params.meeting_url,
                    ctx.params.bot_name,
                    ctx.params.bot_uuid
                );
                let event = BotEvent::for_end_reason(reason, &message);
                emit_event_within(ctx, event, ERROR_NOTIFY_TIMEOUT).await;
            }
            None => warn!("Unknown error occurred, no end reason recorded"),
        }

        let duration_ms = ctx
            .shared
            .start_time()
            .map(|start| now_ms().saturating_sub(start))
            .unwrap_or(0);
        let participants = ctx.shared.participants();
        info!(
            "Error metrics: reason={} duration_ms={} attendees={} first_user_joined={}",
            end_reason.map(|r| r.as_str()).unwrap_or("internalError"),
            duration_ms,
            participants.attendees_count,
            participants.first_user_joined
        );

        Ok(StateTransition::to(MeetingStateType::Cleanup))
    }

    /// Error handling never loops back into Error.
    async fn handle_error(&self, _ctx: &mut MeetingContext, err: anyhow::Error) -> StateTransition {
        error!("Error while handling session error: {:#}", err);
        StateTransition::to(MeetingStateType::Cleanup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MeetingEndReason;
    use crate::testing::TestSession;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_error_state_notifies_and_moves_to_cleanup() {
        let session = TestSession::new();
        session
            .status
            .set_error(MeetingEndReason::BotNotAccepted, "host declined");
        let mut ctx = session.context();

        let transition = ErrorState.execute(&mut ctx).await.unwrap();

        assert_eq!(transition.next_state, MeetingStateType::Cleanup);
        assert_eq!(session.events.codes(), vec!["bot_rejected"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmapped_reason_sends_meeting_error() {
        let session = TestSession::new();
        session
            .status
            .set_error(MeetingEndReason::Internal, "browser crashed");
        let mut ctx = session.context();

        ErrorState.execute(&mut ctx).await.unwrap();

        assert_eq!(
            session.events.events(),
            vec![BotEvent::MeetingError {
                error_message: "browser crashed".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_notification_is_bounded() {
        let session = TestSession::new();
        session.events.hang();
        session.status.set_error(MeetingEndReason::Internal, "boom");
        let mut ctx = session.context();

        let started = tokio::time::Instant::now();
        let transition = ErrorState.execute(&mut ctx).await.unwrap();

        assert_eq!(transition.next_state, MeetingStateType::Cleanup);
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert!(started.elapsed() < Duration::from_secs(16));
    }
}
