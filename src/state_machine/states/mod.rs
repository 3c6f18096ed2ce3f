//! One handler per lifecycle phase.
//!
//! A handler runs to completion against the shared [`MeetingContext`] and
//! returns the next state. Handlers keep their own failures in-house: the
//! `execute` wrapper routes any error out of `run` through `handle_error`,
//! which always resolves to a transition.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use super::context::MeetingContext;
use super::types::{MeetingEndReason, MeetingStateType, StateTransition};
use crate::events::BotEvent;
use crate::state_machine::constants::EVENT_EMIT_TIMEOUT;

pub mod cleanup;
pub mod error;
pub mod in_call;
pub mod initialization;
pub mod paused;
pub mod recording;
pub mod resuming;
pub mod terminated;
pub mod waiting_room;

pub use cleanup::CleanupState;
pub use error::ErrorState;
pub use in_call::InCallState;
pub use initialization::InitializationState;
pub use paused::PausedState;
pub use recording::RecordingState;
pub use resuming::ResumingState;
pub use terminated::TerminatedState;
pub use waiting_room::WaitingRoomState;

/// A bounded step did not finish in time.
#[derive(Debug, Error)]
#[error("{what} timed out after {limit:?}")]
pub struct StepTimeout {
    pub what: &'static str,
    pub limit: Duration,
}

#[async_trait]
pub trait StateHandler: Send + Sync {
    fn state(&self) -> MeetingStateType;

    /// The state's own work. Errors are turned into a transition by `execute`.
    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition>;

    async fn execute(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        match self.run(ctx).await {
            Ok(transition) => Ok(transition),
            Err(e) => Ok(self.handle_error(ctx, e).await),
        }
    }

    /// Record the failure and move to Error. The status error keeps an end
    /// reason recorded earlier, else uses `Internal`.
    async fn handle_error(&self, ctx: &mut MeetingContext, err: anyhow::Error) -> StateTransition {
        record_failure(ctx, self.state(), &err);
        StateTransition::to(MeetingStateType::Error)
    }
}

pub(crate) fn record_failure(ctx: &mut MeetingContext, state: MeetingStateType, err: &anyhow::Error) {
    let message = format!("{:#}", err);
    error!("Error in {} state: {}", state, message);

    let reason = ctx.status().end_reason().unwrap_or(MeetingEndReason::Internal);
    ctx.status().set_error(reason, message.clone());
    ctx.record_error(message);
}

static INITIALIZATION: InitializationState = InitializationState;
static WAITING_ROOM: WaitingRoomState = WaitingRoomState;
static IN_CALL: InCallState = InCallState;
static RECORDING: RecordingState = RecordingState;
static PAUSED: PausedState = PausedState;
static RESUMING: ResumingState = ResumingState;
static ERROR: ErrorState = ErrorState;
static CLEANUP: CleanupState = CleanupState;
static TERMINATED: TerminatedState = TerminatedState;

/// Handler bound to `state`.
pub fn handler_for(state: MeetingStateType) -> &'static dyn StateHandler {
    match state {
        MeetingStateType::Initialization => &INITIALIZATION,
        MeetingStateType::WaitingRoom => &WAITING_ROOM,
        MeetingStateType::InCall => &IN_CALL,
        MeetingStateType::Recording => &RECORDING,
        MeetingStateType::Paused => &PAUSED,
        MeetingStateType::Resuming => &RESUMING,
        MeetingStateType::Error => &ERROR,
        MeetingStateType::Cleanup => &CLEANUP,
        MeetingStateType::Terminated => &TERMINATED,
    }
}

/// Run `fut` under `limit`, failing with [`StepTimeout`] when it expires.
pub async fn bounded<T, F>(limit: Duration, what: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StepTimeout { what, limit }.into()),
    }
}

/// Emit a session event under the emission budget. Failures are logged only.
pub async fn emit_event(ctx: &MeetingContext, event: BotEvent) {
    emit_event_within(ctx, event, EVENT_EMIT_TIMEOUT).await
}

pub async fn emit_event_within(ctx: &MeetingContext, event: BotEvent, limit: Duration) {
    let code = event.code();
    let sink = ctx.events();
    if let Err(e) = bounded(limit, "event emission", sink.emit(event)).await {
        warn!("Failed to emit {} event: {:#}", code, e);
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
