use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info, warn};

use super::{bounded, emit_event, now_ms, StateHandler};
use crate::events::BotEvent;
use crate::meeting::SpeakerTracker;
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, StateTransition};

/// Post-join setup, bounded by the setup timeout.
pub struct InCallState;

#[async_trait]
impl StateHandler for InCallState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::InCall
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        let limit = ctx.timeouts.setup;
        bounded(limit, "recording setup", setup_recording(ctx))
            .await
            .context("Setup recording failed")?;

        Ok(StateTransition::to(MeetingStateType::Recording))
    }
}

async fn setup_recording(ctx: &mut MeetingContext) -> Result<()> {
    info!("Starting recording setup sequence");
    emit_event(ctx, BotEvent::InCallNotRecording).await;

    if ctx.path_manager.is_none() {
        anyhow::bail!("Path manager not initialized");
    }
    let page = ctx.page.clone().context("Meeting page not initialized")?;

    let start_time = now_ms();
    ctx.shared.set_start_time(start_time);
    ctx.joined_at = Some(tokio::time::Instant::now());
    ctx.collaborators.recorder.set_meeting_start_time(start_time);
    info!("Meeting start time set to {}", start_time);

    // Cleaner runs before speaker observation so the observer sees the cleaned page
    let cleaner = ctx.collaborators.html_cleaner.clone();
    match cleaner.start(page.clone()).await {
        Ok(()) => {
            info!("HTML cleanup started");
            ctx.html_cleaner = Some(cleaner);
        }
        Err(e) => warn!("Failed to start HTML cleanup: {:#}", e),
    }

    let callback = SpeakerTracker::new(ctx.shared.clone()).callback();
    ctx.speaker_callback = Some(callback.clone());

    let observer = ctx.collaborators.speakers_observer.clone();
    match observer
        .start_observing(page, ctx.params.recording_mode, &ctx.params.bot_name, callback)
        .await
    {
        Ok(()) => {
            info!("Speakers observer started");
            ctx.speakers_observer = Some(observer);
        }
        Err(e) => error!("Failed to start speakers observation: {:#}", e),
    }

    emit_event(ctx, BotEvent::InCallRecording { start_time }).await;
    info!("Recording setup completed");
    Ok(())
}
