//! Session orchestrator.
//!
//! Drives one bot session through its lifecycle:
//! Initialization → WaitingRoom → InCall → Recording ⇄ Paused/Resuming → Cleanup → Terminated
//!
//! The loop is strictly sequential. Controllers talk to a running session
//! only through the `&self` methods here, which touch the shared cells and
//! never preempt the active handler.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::context::{Collaborators, ControlError, MeetingContext, SessionShared};
use super::states::handler_for;
use super::status::{SessionFailure, SessionStatus};
use super::types::{MeetingEndReason, MeetingStateType, ParticipantState};
use crate::config::{SessionParams, SessionTimeouts};
use crate::meeting::MeetingProvider;

/// How a finished session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub end_reason: Option<MeetingEndReason>,
    pub error: Option<String>,
    pub successful: bool,
}

pub struct MeetingStateMachine {
    shared: Arc<SessionShared>,
    /// Taken by the first `start()`.
    context: Mutex<Option<MeetingContext>>,
}

impl MeetingStateMachine {
    pub fn new(
        params: SessionParams,
        timeouts: SessionTimeouts,
        provider: Arc<dyn MeetingProvider>,
        collaborators: Collaborators,
        status: SessionStatus,
    ) -> Self {
        let shared = Arc::new(SessionShared::new(status));
        let context = MeetingContext::new(params, timeouts, provider, collaborators, shared.clone());

        Self {
            shared,
            context: Mutex::new(Some(context)),
        }
    }

    /// Run the session to Terminated. Only the first call runs anything.
    pub async fn start(&self) -> Result<SessionOutcome, ControlError> {
        let mut ctx = self
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ControlError::AlreadyStarted)?;

        info!(
            "Starting session for {} with provider {}",
            ctx.params.meeting_url,
            ctx.provider.name()
        );

        let mut state = MeetingStateType::Initialization;
        self.shared.set_state(state);

        while state != MeetingStateType::Terminated {
            let handler = handler_for(state);
            let next = match handler.execute(&mut ctx).await {
                Ok(transition) => transition.next_state,
                Err(e) => fallback_transition(&mut ctx, state, &e),
            };

            if next != state {
                info!("State transition: {} -> {}", state, next);
            }
            state = next;
            self.shared.set_state(state);
        }

        let outcome = self.outcome();
        info!(
            "Session finished: reason={} successful={}",
            outcome
                .end_reason
                .map(|r| r.as_str())
                .unwrap_or("none"),
            outcome.successful
        );
        Ok(outcome)
    }

    /// Ask the session to end. Handlers notice on their next poll.
    pub fn request_stop(&self, reason: MeetingEndReason) -> bool {
        let accepted = self.shared.status().set_end_reason(reason);
        if accepted {
            info!("Stop requested: {}", reason);
        } else {
            warn!(
                "Stop request ({}) ignored, session already ending: {:?}",
                reason,
                self.shared.status().end_reason()
            );
        }
        accepted
    }

    pub fn pause_recording(&self) -> Result<(), ControlError> {
        self.shared.pause_recording()?;
        info!("Recording pause requested");
        Ok(())
    }

    pub fn resume_recording(&self) -> Result<(), ControlError> {
        self.shared.resume_recording()?;
        info!("Recording resume requested");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    pub fn current_state(&self) -> MeetingStateType {
        self.shared.current_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<MeetingStateType> {
        self.shared.subscribe()
    }

    pub fn error(&self) -> Option<SessionFailure> {
        self.shared.status().error()
    }

    pub fn end_reason(&self) -> Option<MeetingEndReason> {
        self.shared.status().end_reason()
    }

    pub fn was_recording_successful(&self) -> bool {
        self.shared.status().was_successful()
    }

    /// Returns false when the update was dropped because the session is not recording.
    pub fn update_participant_state(&self, update: ParticipantState) -> bool {
        self.shared.update_participant_state(update)
    }

    pub fn participants(&self) -> ParticipantState {
        self.shared.participants()
    }

    pub fn pause_duration(&self) -> Duration {
        self.shared.pause_duration()
    }

    /// Unix milliseconds at which the call was joined.
    pub fn start_time(&self) -> Option<i64> {
        self.shared.start_time()
    }

    pub fn outcome(&self) -> SessionOutcome {
        let status = self.shared.status();
        SessionOutcome {
            end_reason: status.end_reason(),
            error: status.error().map(|f| f.message),
            successful: status.was_successful(),
        }
    }
}

/// Last-resort net for an error escaping a handler. Error falls through to
/// Cleanup and Cleanup to Terminated so the net cannot cycle.
fn fallback_transition(
    ctx: &mut MeetingContext,
    state: MeetingStateType,
    err: &anyhow::Error,
) -> MeetingStateType {
    let message = format!("{:#}", err);
    error!("Unhandled error in {} state: {}", state, message);

    match state {
        MeetingStateType::Error => MeetingStateType::Cleanup,
        MeetingStateType::Cleanup | MeetingStateType::Terminated => MeetingStateType::Terminated,
        _ => {
            ctx.status().set_error(MeetingEndReason::Internal, message.clone());
            ctx.record_error(message);
            MeetingStateType::Error
        }
    }
}
