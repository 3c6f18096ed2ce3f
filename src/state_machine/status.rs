//! Session outcome slot shared between the machine, its handlers and collaborators.
//!
//! Write policy is first-write-wins for both the end reason and the error
//! record: once a reason (or error) is recorded, later writes are ignored and
//! reported as rejected to the caller.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::types::MeetingEndReason;

/// An error recorded against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub reason: MeetingEndReason,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct StatusInner {
    end_reason: Option<MeetingEndReason>,
    error: Option<SessionFailure>,
}

/// Thread-safe handle to the end-reason/error channel.
///
/// Constructed once per session and injected into the state machine; clones
/// share the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    inner: Arc<Mutex<StatusInner>>,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record why the session ends. Returns false if a reason was already recorded.
    pub fn set_end_reason(&self, reason: MeetingEndReason) -> bool {
        let mut inner = self.lock();
        match inner.end_reason {
            None => {
                info!("Setting end reason: {}", reason);
                inner.end_reason = Some(reason);
                true
            }
            Some(existing) => {
                debug!(
                    "Ignoring end reason {}: {} already recorded",
                    reason, existing
                );
                false
            }
        }
    }

    /// Record a session error. Also records `reason` as the end reason when none
    /// is set yet. Returns false if an error was already recorded.
    pub fn set_error(&self, reason: MeetingEndReason, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut inner = self.lock();

        if inner.end_reason.is_none() {
            inner.end_reason = Some(reason);
        }

        if let Some(existing) = &inner.error {
            warn!(
                "Ignoring error {} ({}): {} already recorded",
                reason, message, existing.reason
            );
            return false;
        }

        warn!("Setting session error: {} ({})", reason, message);
        inner.error = Some(SessionFailure {
            reason,
            message,
            recorded_at: Utc::now(),
        });
        true
    }

    pub fn end_reason(&self) -> Option<MeetingEndReason> {
        self.lock().end_reason
    }

    pub fn error(&self) -> Option<SessionFailure> {
        self.lock().error.clone()
    }

    pub fn has_error(&self) -> bool {
        self.lock().error.is_some()
    }

    /// Whether a stop was requested externally or a login wall was hit.
    pub fn is_stop_requested(&self) -> bool {
        matches!(
            self.end_reason(),
            Some(MeetingEndReason::ApiRequest | MeetingEndReason::LoginRequired)
        )
    }

    /// True iff an end reason was recorded, no error is set, and the reason is
    /// a normal completion. An error always wins over the reason.
    pub fn was_successful(&self) -> bool {
        let inner = self.lock();
        match (inner.end_reason, &inner.error) {
            (Some(reason), None) => reason.is_normal(),
            _ => false,
        }
    }
}
