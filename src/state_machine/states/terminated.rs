use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::StateHandler;
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, StateTransition};

/// Final state. The loop stops as soon as it is reached.
pub struct TerminatedState;

#[async_trait]
impl StateHandler for TerminatedState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Terminated
    }

    async fn run(&self, _ctx: &mut MeetingContext) -> Result<StateTransition> {
        debug!("Session terminated");
        Ok(StateTransition::to(MeetingStateType::Terminated))
    }
}
