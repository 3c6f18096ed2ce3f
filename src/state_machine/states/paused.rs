use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{bounded, emit_event, now_ms, StateHandler};
use crate::events::BotEvent;
use crate::state_machine::constants::PAUSE_POLL_INTERVAL;
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, RecordingSnapshot, StateTransition};

pub struct PausedState;

#[async_trait]
impl StateHandler for PausedState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Paused
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        let pause_started = *ctx.pause_start_time.get_or_insert_with(Instant::now);

        let participants = ctx.shared.participants();
        ctx.last_recording_state = Some(RecordingSnapshot {
            timestamp: now_ms(),
            attendees_count: participants.attendees_count,
            last_speaker_time: participants.last_speaker_time,
            no_speaker_detected_time: participants.no_speaker_detected_time,
        });

        let limit = ctx.timeouts.pause_resume;
        bounded(limit, "pause recording", pause_components(ctx))
            .await
            .context("Failed to pause recording")?;

        emit_event(ctx, BotEvent::RecordingPaused).await;
        info!("Recording paused");

        let next = loop {
            tokio::time::sleep(PAUSE_POLL_INTERVAL).await;

            if let Some(reason) = ctx.status().end_reason() {
                info!("Stop requested while paused ({})", reason);
                break MeetingStateType::Cleanup;
            }

            if pause_started.elapsed() > ctx.timeouts.max_pause {
                warn!(
                    "Maximum pause duration of {}s exceeded, forcing resume",
                    ctx.timeouts.max_pause.as_secs()
                );
                ctx.shared.set_paused(false);
                break MeetingStateType::Resuming;
            }

            if !ctx.shared.is_paused() {
                break MeetingStateType::Resuming;
            }
        };

        let total = ctx.shared.add_pause_duration(pause_started.elapsed());
        info!("Pause ended after {:?} (total paused {:?})", pause_started.elapsed(), total);

        Ok(StateTransition::to(next))
    }
}

async fn pause_components(ctx: &MeetingContext) -> Result<()> {
    if let Some(streaming) = &ctx.streaming {
        streaming.pause().await.context("Failed to pause streaming")?;
        info!("Streaming service paused");
    }

    if let Some(observer) = &ctx.speakers_observer {
        observer
            .stop_observing()
            .await
            .context("Failed to stop speakers observation")?;
        info!("Speakers observation paused");
    }

    Ok(())
}
