//! Session lifecycle: the state machine, its handlers and the state they share.

pub mod constants;
pub mod context;
pub mod machine;
pub mod states;
pub mod status;
pub mod types;

pub use context::{Collaborators, ControlError, MeetingContext, SessionShared};
pub use machine::{MeetingStateMachine, SessionOutcome};
pub use states::{handler_for, StateHandler, StepTimeout};
pub use status::{SessionFailure, SessionStatus};
pub use types::{
    MeetingEndReason, MeetingStateType, ParticipantState, RecordingSnapshot, StateTransition,
    NORMAL_END_REASONS,
};
