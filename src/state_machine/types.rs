//! Lifecycle and outcome types shared by the state machine and its handlers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a bot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeetingStateType {
    Initialization,
    WaitingRoom,
    InCall,
    Recording,
    Paused,
    Resuming,
    Error,
    Cleanup,
    Terminated,
}

impl MeetingStateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::WaitingRoom => "waitingRoom",
            Self::InCall => "inCall",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Resuming => "resuming",
            Self::Error => "error",
            Self::Cleanup => "cleanup",
            Self::Terminated => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for MeetingStateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session stopped. Recorded once per session through `SessionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeetingEndReason {
    // Normal end reasons
    #[serde(rename = "botRemoved")]
    BotRemoved,
    #[serde(rename = "noAttendees")]
    NoAttendees,
    #[serde(rename = "noSpeaker")]
    NoSpeaker,
    #[serde(rename = "recordingTimeout")]
    RecordingTimeout,
    #[serde(rename = "apiRequest")]
    ApiRequest,

    // Error end reasons
    #[serde(rename = "botRemovedTooEarly")]
    BotRemovedTooEarly,
    #[serde(rename = "botNotAccepted")]
    BotNotAccepted,
    #[serde(rename = "cannotJoinMeeting")]
    CannotJoinMeeting,
    #[serde(rename = "timeoutWaitingToStart")]
    TimeoutWaitingToStart,
    #[serde(rename = "invalidMeetingUrl")]
    InvalidMeetingUrl,
    #[serde(rename = "loginRequired")]
    LoginRequired,
    #[serde(rename = "streamingSetupFailed")]
    StreamingSetupFailed,
    #[serde(rename = "internalError")]
    Internal,
}

/// End reasons that count as a normally completed recording.
pub const NORMAL_END_REASONS: [MeetingEndReason; 5] = [
    MeetingEndReason::ApiRequest,
    MeetingEndReason::BotRemoved,
    MeetingEndReason::NoAttendees,
    MeetingEndReason::NoSpeaker,
    MeetingEndReason::RecordingTimeout,
];

impl MeetingEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotRemoved => "botRemoved",
            Self::NoAttendees => "noAttendees",
            Self::NoSpeaker => "noSpeaker",
            Self::RecordingTimeout => "recordingTimeout",
            Self::ApiRequest => "apiRequest",
            Self::BotRemovedTooEarly => "botRemovedTooEarly",
            Self::BotNotAccepted => "botNotAccepted",
            Self::CannotJoinMeeting => "cannotJoinMeeting",
            Self::TimeoutWaitingToStart => "timeoutWaitingToStart",
            Self::InvalidMeetingUrl => "invalidMeetingUrl",
            Self::LoginRequired => "loginRequired",
            Self::StreamingSetupFailed => "streamingSetupFailed",
            Self::Internal => "internalError",
        }
    }

    pub fn is_normal(&self) -> bool {
        NORMAL_END_REASONS.contains(self)
    }

    /// Human-readable explanation, suitable for webhook payloads and logs.
    pub fn description(&self) -> &'static str {
        match self {
            Self::BotRemoved => "Bot was removed from the meeting.",
            Self::NoAttendees => "No attendees joined the meeting.",
            Self::NoSpeaker => "No speakers detected during recording.",
            Self::RecordingTimeout => "Recording timeout reached.",
            Self::ApiRequest => "Recording stopped via API request.",
            Self::BotRemovedTooEarly => "Bot was removed too early; the video is too short.",
            Self::BotNotAccepted => "Bot was not accepted into the meeting.",
            Self::CannotJoinMeeting => "Cannot join meeting - meeting is not reachable.",
            Self::TimeoutWaitingToStart => "Timeout waiting to start recording.",
            Self::InvalidMeetingUrl => "Invalid meeting URL provided.",
            Self::LoginRequired => "The meeting requires a signed-in account.",
            Self::StreamingSetupFailed => "Failed to set up streaming audio.",
            Self::Internal => "Internal error occurred during recording.",
        }
    }
}

impl fmt::Display for MeetingEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant information pushed by the speakers observer or an external controller.
///
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantState {
    pub attendees_count: u32,
    pub first_user_joined: bool,
    #[serde(default)]
    pub last_speaker_time: Option<i64>,
    #[serde(default)]
    pub no_speaker_detected_time: Option<i64>,
}

/// Snapshot taken when entering Paused and restored by Resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSnapshot {
    pub timestamp: i64,
    pub attendees_count: u32,
    pub last_speaker_time: Option<i64>,
    pub no_speaker_detected_time: Option<i64>,
}

/// Value returned by every state handler. The context itself is threaded
/// through the handler by mutable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub next_state: MeetingStateType,
}

impl StateTransition {
    pub fn to(next_state: MeetingStateType) -> Self {
        Self { next_state }
    }
}
