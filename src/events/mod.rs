//! Session status events.
//!
//! States announce lifecycle milestones through an [`EventSink`]. Delivery is
//! best-effort: the caller bounds each emission and only logs failures.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::state_machine::MeetingEndReason;

pub mod webhook;

pub use webhook::WebhookEventSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    InWaitingRoom,
    InCallNotRecording,
    InCallRecording { start_time: i64 },
    RecordingPaused,
    RecordingResumed,
    CallEnded,
    BotRejected,
    BotRemoved,
    BotRemovedTooEarly,
    WaitingRoomTimeout,
    InvalidMeetingUrl,
    ApiRequestStop,
    MeetingError { error_message: String },
}

impl BotEvent {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InWaitingRoom => "in_waiting_room",
            Self::InCallNotRecording => "in_call_not_recording",
            Self::InCallRecording { .. } => "in_call_recording",
            Self::RecordingPaused => "recording_paused",
            Self::RecordingResumed => "recording_resumed",
            Self::CallEnded => "call_ended",
            Self::BotRejected => "bot_rejected",
            Self::BotRemoved => "bot_removed",
            Self::BotRemovedTooEarly => "bot_removed_too_early",
            Self::WaitingRoomTimeout => "waiting_room_timeout",
            Self::InvalidMeetingUrl => "invalid_meeting_url",
            Self::ApiRequestStop => "api_request_stop",
            Self::MeetingError { .. } => "meeting_error",
        }
    }

    /// Pause and resume can happen many times per session; everything else is sent once.
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::RecordingPaused | Self::RecordingResumed)
    }

    /// Extra fields merged into the event's status object.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        match self {
            Self::InCallRecording { start_time } => {
                details.insert("start_time".to_string(), json!(start_time));
            }
            Self::MeetingError { error_message } => {
                details.insert("error_message".to_string(), json!(error_message));
            }
            _ => {}
        }
        details
    }

    /// Event announcing a session that ended with `reason`.
    pub fn for_end_reason(reason: MeetingEndReason, message: &str) -> Self {
        match reason {
            MeetingEndReason::BotNotAccepted => Self::BotRejected,
            MeetingEndReason::BotRemoved => Self::BotRemoved,
            MeetingEndReason::BotRemovedTooEarly => Self::BotRemovedTooEarly,
            MeetingEndReason::TimeoutWaitingToStart => Self::WaitingRoomTimeout,
            MeetingEndReason::InvalidMeetingUrl => Self::InvalidMeetingUrl,
            MeetingEndReason::ApiRequest => Self::ApiRequestStop,
            _ => Self::MeetingError {
                error_message: message.to_string(),
            },
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: BotEvent) -> Result<()>;
}

/// Logs events. Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: BotEvent) -> Result<()> {
        let details = event.details();
        if details.is_empty() {
            info!("Session event: {}", event.code());
        } else {
            let details = Value::Object(details).to_string();
            info!("Session event: {} {}", event.code(), details);
        }
        Ok(())
    }
}
