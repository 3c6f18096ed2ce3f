use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{bounded, emit_event, now_ms, StateHandler, StepTimeout};
use crate::events::BotEvent;
use crate::state_machine::constants::{
    BOT_REMOVED_CHECK_TIMEOUT, RECORDING_POLL_INTERVAL, SOUND_LEVEL_ACTIVITY_THRESHOLD,
};
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingEndReason, MeetingStateType, StateTransition};

/// Watches the live call until it ends or a pause is requested.
pub struct RecordingState;

enum Check {
    Continue,
    Pause,
    End(MeetingEndReason),
}

#[async_trait]
impl StateHandler for RecordingState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Recording
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        info!("Starting recording state");

        let joined_at = *ctx.joined_at.get_or_insert_with(Instant::now);
        let mut watch = EndConditions::default();

        loop {
            match watch.check(ctx, joined_at).await {
                Check::Continue => {}
                Check::Pause => {
                    info!("Pause requested, leaving recording loop");
                    return Ok(StateTransition::to(MeetingStateType::Paused));
                }
                Check::End(reason) => {
                    info!("Meeting end condition met: {}", reason);
                    ctx.status().set_end_reason(reason);
                    handle_meeting_end(ctx, reason).await;
                    return Ok(StateTransition::to(MeetingStateType::Cleanup));
                }
            }

            tokio::time::sleep(RECORDING_POLL_INTERVAL).await;
        }
    }
}

/// Per-entry bookkeeping for the end checks.
#[derive(Default)]
struct EndConditions {
    empty_since: Option<Instant>,
}

impl EndConditions {
    async fn check(&mut self, ctx: &MeetingContext, joined_at: Instant) -> Check {
        let status = ctx.status();

        // Recording time excludes time spent paused.
        let recorded = joined_at.elapsed().saturating_sub(ctx.shared.pause_duration());
        if recorded > ctx.timeouts.recording {
            warn!("Recording timeout reached after {}s", recorded.as_secs());
            return Check::End(MeetingEndReason::RecordingTimeout);
        }

        if let Some(reason) = status.end_reason() {
            return Check::End(reason);
        }

        if let Some(message) = ctx.collaborators.recorder.last_error() {
            warn!("Recorder reported a failure: {}", message);
            status.set_error(MeetingEndReason::StreamingSetupFailed, message);
            return Check::End(MeetingEndReason::StreamingSetupFailed);
        }

        if bot_removed(ctx).await {
            return Check::End(removed_reason(ctx));
        }

        if ctx.shared.is_paused() {
            return Check::Pause;
        }

        if let Some(streaming) = &ctx.streaming {
            let level = streaming.current_sound_level();
            if level > SOUND_LEVEL_ACTIVITY_THRESHOLD {
                debug!("Sound activity detected ({:.2}), resetting silence timers", level);
                self.empty_since = None;
                ctx.shared.clear_silence();
                return Check::Continue;
            }
        }

        let now = now_ms();
        if self.no_attendees(ctx, joined_at, now) {
            return Check::End(MeetingEndReason::NoAttendees);
        }
        if no_speaker(ctx, now) {
            return Check::End(MeetingEndReason::NoSpeaker);
        }

        Check::Continue
    }

    fn no_attendees(&mut self, ctx: &MeetingContext, joined_at: Instant, now: i64) -> bool {
        let participants = ctx.shared.participants();

        if participants.attendees_count > 0 {
            self.empty_since = None;
            return false;
        }

        let initial_wait_over = joined_at.elapsed() > ctx.timeouts.initial_wait;
        if !initial_wait_over && !participants.first_user_joined {
            self.empty_since = None;
            return false;
        }

        let Some(empty_since) = self.empty_since else {
            debug!("Starting empty meeting confirmation timer");
            self.empty_since = Some(Instant::now());
            return false;
        };

        if empty_since.elapsed() < ctx.timeouts.empty_meeting_confirmation {
            return false;
        }

        // Empty long enough; only end if the room is also silent.
        no_speaker(ctx, now)
    }
}

fn no_speaker(ctx: &MeetingContext, now: i64) -> bool {
    let Some(silent_since) = ctx.shared.participants().no_speaker_detected_time else {
        return false;
    };

    let silence_ms = now.saturating_sub(silent_since);
    let limit_ms = ctx.timeouts.silence.as_millis() as i64;
    if silence_ms > limit_ms {
        info!("No speaker detected for {}s, ending meeting", silence_ms / 1000);
        return true;
    }
    false
}

/// A stalled check counts as removed; a failed one does not.
async fn bot_removed(ctx: &MeetingContext) -> bool {
    let Some(page) = ctx.page.clone() else {
        warn!("Meeting page not available, treating bot as removed");
        return true;
    };

    let provider = ctx.provider.clone();
    let check = bounded(BOT_REMOVED_CHECK_TIMEOUT, "bot removed check", async {
        provider
            .find_end_meeting(page)
            .await
            .map_err(anyhow::Error::from)
    })
    .await;

    match check {
        Ok(removed) => removed,
        Err(e) if e.is::<StepTimeout>() => {
            warn!("Bot removed check stalled, treating bot as removed: {:#}", e);
            true
        }
        Err(e) => {
            warn!("Bot removed check failed: {:#}", e);
            false
        }
    }
}

/// An error recorded elsewhere (e.g. by the recorder) takes precedence.
fn removed_reason(ctx: &MeetingContext) -> MeetingEndReason {
    let status = ctx.status();
    if status.has_error() {
        if let Some(reason) = status.end_reason() {
            info!("Using existing error instead of bot removed: {}", reason);
            return reason;
        }
    }
    MeetingEndReason::BotRemoved
}

async fn handle_meeting_end(ctx: &MeetingContext, reason: MeetingEndReason) {
    if reason == MeetingEndReason::BotRemoved {
        info!("Bot was removed from the meeting, skipping active close");
    } else if let Some(page) = ctx.page.clone() {
        ctx.provider.close_meeting(page).await;
    }

    emit_event(ctx, BotEvent::CallEnded).await;
}
