//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Getting session status (GET /status)
//! - Ending the session (POST /stop)
//! - Pausing and resuming recording (POST /pause, POST /resume)
//! - Pushing participant state (POST /participants)

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiResult;
use crate::state_machine::{MeetingEndReason, MeetingStateMachine, ParticipantState};

type SessionState = Arc<MeetingStateMachine>;

/// Request body for the stop endpoint. Defaults to an API stop.
#[derive(Debug, Default, Deserialize)]
pub struct StopRequest {
    pub reason: Option<MeetingEndReason>,
}

pub fn router(machine: SessionState) -> Router {
    Router::new()
        .route("/status", get(session_status))
        .route("/stop", post(stop_session))
        .route("/pause", post(pause_recording))
        .route("/resume", post(resume_recording))
        .route("/participants", post(update_participants))
        .with_state(machine)
}

async fn session_status(State(machine): State<SessionState>) -> Json<Value> {
    let error = machine.error();

    Json(json!({
        "state": machine.current_state(),
        "paused": machine.is_paused(),
        "end_reason": machine.end_reason(),
        "error": error.as_ref().map(|f| f.message.clone()),
        "error_time": error.map(|f| f.recorded_at.to_rfc3339()),
        "successful": machine.was_recording_successful(),
        "participants": machine.participants(),
        "start_time": machine.start_time(),
        "pause_duration_ms": machine.pause_duration().as_millis() as u64,
    }))
}

async fn stop_session(
    State(machine): State<SessionState>,
    body: Option<Json<StopRequest>>,
) -> Json<Value> {
    let reason = body
        .and_then(|Json(req)| req.reason)
        .unwrap_or(MeetingEndReason::ApiRequest);

    info!("Stop command received via API ({})", reason);
    let accepted = machine.request_stop(reason);

    Json(json!({
        "success": true,
        "accepted": accepted,
        "end_reason": machine.end_reason(),
    }))
}

/// 409 unless the session is recording.
async fn pause_recording(State(machine): State<SessionState>) -> ApiResult<Json<Value>> {
    machine.pause_recording()?;

    Ok(Json(json!({
        "success": true,
        "state": machine.current_state(),
    })))
}

/// 409 unless the session is paused.
async fn resume_recording(State(machine): State<SessionState>) -> ApiResult<Json<Value>> {
    machine.resume_recording()?;

    Ok(Json(json!({
        "success": true,
        "state": machine.current_state(),
    })))
}

async fn update_participants(
    State(machine): State<SessionState>,
    Json(update): Json<ParticipantState>,
) -> Json<Value> {
    let applied = machine.update_participant_state(update);

    Json(json!({
        "success": true,
        "applied": applied,
    }))
}
