use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use super::{bounded, emit_event, StateHandler};
use crate::events::BotEvent;
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, StateTransition};

pub struct ResumingState;

#[async_trait]
impl StateHandler for ResumingState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Resuming
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        let limit = ctx.timeouts.pause_resume;
        bounded(limit, "resume recording", resume_components(ctx))
            .await
            .context("Failed to resume recording")?;

        emit_event(ctx, BotEvent::RecordingResumed).await;

        ctx.pause_start_time = None;
        ctx.shared.set_paused(false);

        if let Some(snapshot) = ctx.last_recording_state.take() {
            let mut participants = ctx.shared.participants();
            participants.attendees_count = snapshot.attendees_count;
            participants.last_speaker_time = snapshot.last_speaker_time;
            participants.no_speaker_detected_time = snapshot.no_speaker_detected_time;
            ctx.shared.replace_participants(participants);
        }

        info!("Recording resumed");
        Ok(StateTransition::to(MeetingStateType::Recording))
    }
}

async fn resume_components(ctx: &MeetingContext) -> Result<()> {
    if let Some(streaming) = &ctx.streaming {
        streaming.resume().await.context("Failed to resume streaming")?;
        info!("Streaming service resumed");
    }

    if let (Some(observer), Some(page), Some(callback)) =
        (&ctx.speakers_observer, &ctx.page, &ctx.speaker_callback)
    {
        observer
            .start_observing(
                page.clone(),
                ctx.params.recording_mode,
                &ctx.params.bot_name,
                callback.clone(),
            )
            .await
            .context("Failed to restart speakers observation")?;
        info!("Speakers observation resumed");
    }

    Ok(())
}
