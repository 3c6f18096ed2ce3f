//! Turns speakers-observer batches into participant state.

use std::sync::Arc;
use tracing::debug;

use super::observers::{SpeakerSnapshot, SpeakersCallback};
use crate::state_machine::SessionShared;

pub struct SpeakerTracker {
    shared: Arc<SessionShared>,
}

impl SpeakerTracker {
    pub fn new(shared: Arc<SessionShared>) -> Arc<Self> {
        Arc::new(Self { shared })
    }

    /// Callback to hand to the speakers observer.
    pub fn callback(self: &Arc<Self>) -> SpeakersCallback {
        let tracker = Arc::clone(self);
        Arc::new(move |speakers| {
            tracker.handle_speakers(&speakers, chrono::Utc::now().timestamp_millis());
        })
    }

    /// Fold one batch observed at `now` (Unix ms) into the session. Returns
    /// whether the update was applied.
    pub fn handle_speakers(&self, speakers: &[SpeakerSnapshot], now: i64) -> bool {
        let active = speakers.iter().filter(|s| s.is_speaking).count();

        match self
            .shared
            .record_speakers(speakers.len() as u32, active > 0, now)
        {
            Some(state) => {
                debug!(
                    "Speakers update: {} attendees, {} speaking",
                    state.attendees_count, active
                );
                true
            }
            None => false,
        }
    }
}
