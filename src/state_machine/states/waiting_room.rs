use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{bounded, emit_event, record_failure, StateHandler};
use crate::events::BotEvent;
use crate::meeting::{CancelCheck, JoinNotifier, Page, ProviderError};
use crate::state_machine::constants::{
    COMPONENT_START_TIMEOUT, JOIN_SETTLE_GRACE, PAGE_OPEN_TIMEOUT, RECORDER_START_TIMEOUT,
    WAITING_ROOM_POLL_INTERVAL,
};
use crate::state_machine::context::MeetingContext;
use crate::state_machine::status::SessionStatus;
use crate::state_machine::types::{MeetingEndReason, MeetingStateType, StateTransition};

/// Opens the meeting page and waits to be admitted.
pub struct WaitingRoomState;

#[async_trait]
impl StateHandler for WaitingRoomState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::WaitingRoom
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        info!("Entering waiting room state");

        let browser = ctx
            .browser_session
            .clone()
            .context("Browser session not initialized")?;
        let provider = ctx.provider.clone();

        let meeting = match provider.parse_meeting_url(&ctx.params.meeting_url).await {
            Ok(meeting) => meeting,
            Err(e) => {
                ctx.status()
                    .set_error(MeetingEndReason::InvalidMeetingUrl, e.to_string());
                return Err(anyhow!(e).context("Failed to parse meeting URL"));
            }
        };
        info!(
            "Meeting info retrieved: {} (password: {})",
            meeting.meeting_id,
            meeting.password.is_some()
        );

        let link = provider.meeting_link(&meeting, &ctx.params.bot_name);

        start_dialog_observer(ctx).await;

        info!("Opening meeting page: {}", link);
        let streaming_input = ctx.params.streaming_input.clone();
        let page = bounded(PAGE_OPEN_TIMEOUT, "meeting page open", async {
            provider
                .open_meeting_page(browser, &link, streaming_input.as_deref())
                .await
                .map_err(anyhow::Error::from)
        })
        .await
        .context("Failed to open meeting page")?;
        ctx.page = Some(page.clone());

        if let Some(snapshots) = ctx.snapshot_service() {
            let page = page.clone();
            tokio::spawn(async move {
                snapshots
                    .capture(page.as_ref(), "waiting_room_page_opened")
                    .await;
            });
        }

        start_streaming(ctx).await;
        start_recorder_in_background(ctx, page.clone());

        emit_event(ctx, BotEvent::InWaitingRoom).await;

        wait_for_acceptance(ctx, page).await?;
        info!("Successfully joined meeting");

        Ok(StateTransition::to(MeetingStateType::InCall))
    }

    async fn handle_error(&self, ctx: &mut MeetingContext, err: anyhow::Error) -> StateTransition {
        let event = match ctx.status().end_reason() {
            Some(MeetingEndReason::BotNotAccepted) => Some(BotEvent::BotRejected),
            Some(MeetingEndReason::TimeoutWaitingToStart) => Some(BotEvent::WaitingRoomTimeout),
            Some(MeetingEndReason::ApiRequest) => Some(BotEvent::ApiRequestStop),
            Some(MeetingEndReason::InvalidMeetingUrl) => Some(BotEvent::InvalidMeetingUrl),
            _ => None,
        };
        if let Some(event) = event {
            emit_event(ctx, event).await;
        }

        record_failure(ctx, self.state(), &err);
        StateTransition::to(MeetingStateType::Error)
    }
}

async fn start_dialog_observer(ctx: &mut MeetingContext) {
    let observer = ctx.collaborators.dialog_observer.clone();
    ctx.dialog_observer = Some(observer.clone());

    if let Err(e) = bounded(
        COMPONENT_START_TIMEOUT,
        "dialog observer setup",
        observer.setup_global_dialog_observer(),
    )
    .await
    {
        warn!("Failed to start dialog observer: {:#}", e);
    }
}

async fn start_streaming(ctx: &mut MeetingContext) {
    let Some(streaming) = ctx.collaborators.streaming.clone() else {
        return;
    };

    match bounded(COMPONENT_START_TIMEOUT, "streaming start", streaming.start()).await {
        Ok(()) => {
            info!("Streaming service started");
            ctx.streaming = Some(streaming);
        }
        Err(e) => warn!("Streaming service failed to start, continuing without it: {:#}", e),
    }
}

fn start_recorder_in_background(ctx: &mut MeetingContext, page: Arc<dyn Page>) {
    let recorder = ctx.collaborators.recorder.clone();
    let status = ctx.status().clone();

    let task = tokio::spawn(async move {
        let started = bounded(
            RECORDER_START_TIMEOUT,
            "recorder start",
            recorder.start_recording(page),
        )
        .await;
        if let Err(e) = started {
            error!("Failed to start recording: {:#}", e);
            status.set_error(MeetingEndReason::StreamingSetupFailed, format!("{:#}", e));
        }
    });
    ctx.recorder_start = Some(task);
}

fn join_failure(status: &SessionStatus, err: ProviderError) -> anyhow::Error {
    if let Some(reason) = err.end_reason() {
        status.set_error(reason, err.to_string());
    }
    anyhow!(err).context("Failed to join meeting")
}

/// Race the join against the waiting-room deadline and the stop signal.
async fn wait_for_acceptance(ctx: &MeetingContext, page: Arc<dyn Page>) -> Result<()> {
    let limit = ctx.timeouts.waiting_room;
    let status = ctx.status().clone();
    info!("Waiting room timeout set to {}s", limit.as_secs());

    let joined = Arc::new(AtomicBool::new(false));
    let cancel_check: CancelCheck = {
        let status = status.clone();
        Arc::new(move || status.end_reason() == Some(MeetingEndReason::ApiRequest))
    };
    let on_join_success: JoinNotifier = {
        let joined = joined.clone();
        Arc::new(move || {
            joined.store(true, Ordering::SeqCst);
            info!("Join successful notification received");
        })
    };

    let join = ctx
        .provider
        .join_meeting(page, &ctx.params, cancel_check, on_join_success);
    tokio::pin!(join);

    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    let mut stop_poll = tokio::time::interval_at(
        tokio::time::Instant::now() + WAITING_ROOM_POLL_INTERVAL,
        WAITING_ROOM_POLL_INTERVAL,
    );

    loop {
        tokio::select! {
            result = &mut join => {
                return result.map_err(|e| join_failure(&status, e));
            }
            _ = &mut deadline => {
                if joined.load(Ordering::SeqCst) {
                    info!(
                        "Admitted before the waiting room timeout, allowing {}s for the join to settle",
                        JOIN_SETTLE_GRACE.as_secs()
                    );
                    return match tokio::time::timeout(JOIN_SETTLE_GRACE, &mut join).await {
                        Ok(result) => result.map_err(|e| join_failure(&status, e)),
                        Err(_) => {
                            warn!("Join did not settle in time, continuing as joined");
                            Ok(())
                        }
                    };
                }

                status.set_error(
                    MeetingEndReason::TimeoutWaitingToStart,
                    "Waiting room timeout reached",
                );
                bail!("Waiting room timeout reached after {}s", limit.as_secs());
            }
            _ = stop_poll.tick() => {
                if status.is_stop_requested() {
                    let reason = status
                        .end_reason()
                        .unwrap_or(MeetingEndReason::ApiRequest);
                    bail!("Stop requested while in the waiting room ({})", reason);
                }
            }
        }
    }
}
