//! Session context threaded through every state handler, and the part of it
//! the external control surface can reach while the loop runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::status::SessionStatus;
use super::types::{MeetingStateType, ParticipantState, RecordingSnapshot};
use crate::config::{SessionParams, SessionTimeouts};
use crate::events::EventSink;
use crate::meeting::{
    BrowserLauncher, BrowserSession, DialogObserver, HtmlCleaner, MeetingProvider, Page,
    SpeakersCallback, SpeakersObserver,
};
use crate::paths::{HtmlSnapshotService, PathManager, StorageRoots};
use crate::recording::{Branding, BrandingProcess, Recorder, StreamingService};

/// Rejections from the external control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("cannot pause while {0}; recording must be active")]
    NotRecording(MeetingStateType),
    #[error("cannot resume while {0}; recording must be paused")]
    NotPaused(MeetingStateType),
    #[error("state machine already started")]
    AlreadyStarted,
}

#[derive(Debug, Default)]
struct SessionTiming {
    start_time: Option<i64>,
    total_pause: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fields shared between the sequential loop and concurrent writers (API
/// handlers, the speakers-observer callback).
#[derive(Debug)]
pub struct SessionShared {
    state: watch::Sender<MeetingStateType>,
    /// State whose handler the loop is running. Control requests only move
    /// `state`.
    active: Mutex<MeetingStateType>,
    status: SessionStatus,
    participants: Mutex<ParticipantState>,
    paused: AtomicBool,
    timing: Mutex<SessionTiming>,
}

impl SessionShared {
    pub fn new(status: SessionStatus) -> Self {
        let (state, _) = watch::channel(MeetingStateType::Initialization);
        Self {
            state,
            active: Mutex::new(MeetingStateType::Initialization),
            status,
            participants: Mutex::new(ParticipantState::default()),
            paused: AtomicBool::new(false),
            timing: Mutex::new(SessionTiming::default()),
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn current_state(&self) -> MeetingStateType {
        *self.state.borrow()
    }

    /// The loop entered `state`.
    pub fn set_state(&self, state: MeetingStateType) {
        *lock(&self.active) = state;
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("State changed: {} -> {}", previous, state);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MeetingStateType> {
        self.state.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    /// Recording -> Paused, as one compare-and-set on the state cell.
    pub fn pause_recording(&self) -> Result<(), ControlError> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if *state != MeetingStateType::Recording {
                rejected = Some(*state);
                return false;
            }
            self.paused.store(true, Ordering::SeqCst);
            *state = MeetingStateType::Paused;
            true
        });

        match rejected {
            Some(state) => Err(ControlError::NotRecording(state)),
            None => Ok(()),
        }
    }

    /// Paused -> Resuming, as one compare-and-set on the state cell. Rejected
    /// until the loop has actually entered Paused.
    pub fn resume_recording(&self) -> Result<(), ControlError> {
        let active = lock(&self.active);
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if *state != MeetingStateType::Paused {
                rejected = Some(*state);
                return false;
            }
            if *active != MeetingStateType::Paused {
                rejected = Some(*active);
                return false;
            }
            self.paused.store(false, Ordering::SeqCst);
            *state = MeetingStateType::Resuming;
            true
        });

        match rejected {
            Some(state) => Err(ControlError::NotPaused(state)),
            None => Ok(()),
        }
    }

    pub fn participants(&self) -> ParticipantState {
        *lock(&self.participants)
    }

    /// Overwrite the participant cell regardless of state.
    pub fn replace_participants(&self, participants: ParticipantState) {
        *lock(&self.participants) = participants;
    }

    /// Apply an observer update. Ignored unless the session is recording.
    /// `first_user_joined` never goes back to false.
    pub fn update_participant_state(&self, update: ParticipantState) -> bool {
        // Hold the state borrow so a concurrent pause cannot interleave.
        let state = self.state.borrow();
        if *state != MeetingStateType::Recording {
            return false;
        }

        let mut participants = lock(&self.participants);
        participants.attendees_count = update.attendees_count;
        participants.first_user_joined |= update.first_user_joined;
        participants.last_speaker_time = update.last_speaker_time;
        participants.no_speaker_detected_time = update.no_speaker_detected_time;
        true
    }

    /// Sound was heard: drop the silence marker.
    pub fn clear_silence(&self) {
        lock(&self.participants).no_speaker_detected_time = None;
    }

    /// Fold one speakers batch observed at `now` (Unix ms) into the
    /// participant cell. The silence marker starts at the first quiet batch
    /// and is kept until someone speaks or [`Self::clear_silence`] drops it.
    /// Ignored unless the session is recording.
    pub fn record_speakers(
        &self,
        attendees_count: u32,
        speaking: bool,
        now: i64,
    ) -> Option<ParticipantState> {
        let state = self.state.borrow();
        if *state != MeetingStateType::Recording {
            return None;
        }

        let mut participants = lock(&self.participants);
        participants.attendees_count = attendees_count;
        participants.first_user_joined |= attendees_count > 0;
        if speaking {
            participants.last_speaker_time = Some(now);
            participants.no_speaker_detected_time = None;
        } else if participants.no_speaker_detected_time.is_none() {
            participants.no_speaker_detected_time = Some(now);
        }
        Some(*participants)
    }

    pub fn start_time(&self) -> Option<i64> {
        lock(&self.timing).start_time
    }

    pub fn set_start_time(&self, timestamp: i64) {
        lock(&self.timing).start_time = Some(timestamp);
    }

    pub fn pause_duration(&self) -> Duration {
        lock(&self.timing).total_pause
    }

    pub fn add_pause_duration(&self, elapsed: Duration) -> Duration {
        let mut timing = lock(&self.timing);
        timing.total_pause += elapsed;
        timing.total_pause
    }
}

/// Components the states start during the session.
#[derive(Clone)]
pub struct Collaborators {
    pub browser: Arc<dyn BrowserLauncher>,
    pub recorder: Arc<dyn Recorder>,
    pub speakers_observer: Arc<dyn SpeakersObserver>,
    pub html_cleaner: Arc<dyn HtmlCleaner>,
    pub dialog_observer: Arc<dyn DialogObserver>,
    pub streaming: Option<Arc<dyn StreamingService>>,
    pub branding: Option<Arc<dyn Branding>>,
    pub events: Arc<dyn EventSink>,
    pub storage: StorageRoots,
}

/// Mutable record of one session. Owned by the state machine and lent to the
/// active handler.
pub struct MeetingContext {
    pub params: SessionParams,
    pub timeouts: SessionTimeouts,
    pub provider: Arc<dyn MeetingProvider>,
    pub collaborators: Collaborators,
    pub shared: Arc<SessionShared>,

    pub error: Option<String>,
    /// Unix milliseconds of the last recorded error.
    pub error_time: Option<i64>,
    pub joined_at: Option<Instant>,
    pub pause_start_time: Option<Instant>,
    pub last_recording_state: Option<RecordingSnapshot>,
    pub speaker_callback: Option<SpeakersCallback>,
    /// Recorder start launched from the waiting room. Aborted by cleanup if
    /// still pending.
    pub recorder_start: Option<JoinHandle<()>>,

    // Active collaborator handles, released during cleanup.
    pub browser_session: Option<Arc<dyn BrowserSession>>,
    pub page: Option<Arc<dyn Page>>,
    pub dialog_observer: Option<Arc<dyn DialogObserver>>,
    pub speakers_observer: Option<Arc<dyn SpeakersObserver>>,
    pub html_cleaner: Option<Arc<dyn HtmlCleaner>>,
    pub streaming: Option<Arc<dyn StreamingService>>,
    pub path_manager: Option<PathManager>,
    pub branding: Option<Arc<dyn BrandingProcess>>,
}

impl MeetingContext {
    pub fn new(
        params: SessionParams,
        timeouts: SessionTimeouts,
        provider: Arc<dyn MeetingProvider>,
        collaborators: Collaborators,
        shared: Arc<SessionShared>,
    ) -> Self {
        Self {
            params,
            timeouts,
            provider,
            collaborators,
            shared,
            error: None,
            error_time: None,
            joined_at: None,
            pause_start_time: None,
            last_recording_state: None,
            speaker_callback: None,
            recorder_start: None,
            browser_session: None,
            page: None,
            dialog_observer: None,
            speakers_observer: None,
            html_cleaner: None,
            streaming: None,
            path_manager: None,
            branding: None,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        self.shared.status()
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.collaborators.events.clone()
    }

    pub fn snapshot_service(&self) -> Option<HtmlSnapshotService> {
        self.path_manager
            .as_ref()
            .map(|paths| HtmlSnapshotService::new(paths.html_snapshots_path()))
    }

    pub fn record_error(&mut self, message: String) {
        self.error = Some(message);
        self.error_time = Some(chrono::Utc::now().timestamp_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_in(state: MeetingStateType) -> SessionShared {
        let shared = SessionShared::new(SessionStatus::new());
        shared.set_state(state);
        shared
    }

    #[test]
    fn test_pause_requires_recording() {
        for state in [
            MeetingStateType::Initialization,
            MeetingStateType::WaitingRoom,
            MeetingStateType::InCall,
            MeetingStateType::Paused,
            MeetingStateType::Cleanup,
        ] {
            let shared = shared_in(state);
            assert_eq!(
                shared.pause_recording(),
                Err(ControlError::NotRecording(state))
            );
            assert!(!shared.is_paused());
            assert_eq!(shared.current_state(), state);
        }
    }

    #[test]
    fn test_pause_then_resume() {
        let shared = shared_in(MeetingStateType::Recording);

        shared.pause_recording().unwrap();
        assert!(shared.is_paused());
        assert_eq!(shared.current_state(), MeetingStateType::Paused);

        shared.set_state(MeetingStateType::Paused);
        shared.resume_recording().unwrap();
        assert!(!shared.is_paused());
        assert_eq!(shared.current_state(), MeetingStateType::Resuming);
    }

    #[test]
    fn test_resume_requires_paused() {
        let shared = shared_in(MeetingStateType::Recording);
        assert_eq!(
            shared.resume_recording(),
            Err(ControlError::NotPaused(MeetingStateType::Recording))
        );
        assert_eq!(shared.current_state(), MeetingStateType::Recording);
    }

    #[test]
    fn test_resume_waits_for_paused_handler() {
        let shared = shared_in(MeetingStateType::Recording);
        shared.pause_recording().unwrap();

        // The recording loop has not noticed the pause yet
        assert_eq!(
            shared.resume_recording(),
            Err(ControlError::NotPaused(MeetingStateType::Recording))
        );
        assert!(shared.is_paused());
        assert_eq!(shared.current_state(), MeetingStateType::Paused);

        shared.set_state(MeetingStateType::Paused);
        shared.resume_recording().unwrap();
        assert_eq!(shared.current_state(), MeetingStateType::Resuming);
    }

    #[test]
    fn test_participant_updates_only_while_recording() {
        let shared = shared_in(MeetingStateType::InCall);
        let update = ParticipantState {
            attendees_count: 4,
            first_user_joined: true,
            last_speaker_time: Some(10),
            no_speaker_detected_time: None,
        };

        assert!(!shared.update_participant_state(update));
        assert_eq!(shared.participants(), ParticipantState::default());

        shared.set_state(MeetingStateType::Recording);
        assert!(shared.update_participant_state(update));
        assert_eq!(shared.participants(), update);
    }

    #[test]
    fn test_first_user_joined_is_sticky() {
        let shared = shared_in(MeetingStateType::Recording);
        shared.update_participant_state(ParticipantState {
            attendees_count: 1,
            first_user_joined: true,
            ..Default::default()
        });
        shared.update_participant_state(ParticipantState::default());

        let participants = shared.participants();
        assert_eq!(participants.attendees_count, 0);
        assert!(participants.first_user_joined);
    }

    #[test]
    fn test_pause_duration_accumulates() {
        let shared = shared_in(MeetingStateType::Recording);
        shared.add_pause_duration(Duration::from_millis(1500));
        let total = shared.add_pause_duration(Duration::from_millis(500));
        assert_eq!(total, Duration::from_secs(2));
        assert_eq!(shared.pause_duration(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let shared = shared_in(MeetingStateType::Recording);
        let mut rx = shared.subscribe();

        shared.pause_recording().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), MeetingStateType::Paused);
    }
}
