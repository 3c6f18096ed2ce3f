//! Wiring for one bot session: config-derived pieces, the control API and
//! signal handling around a [`MeetingStateMachine`].

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::ApiServer;
use crate::config::{Config, EventsConfig, SessionParams, SessionTimeouts};
use crate::events::{EventSink, TracingEventSink, WebhookEventSink};
use crate::state_machine::{MeetingEndReason, MeetingStateMachine, SessionOutcome};

/// Webhook sink when an endpoint is configured, log-only otherwise.
pub fn build_event_sink(config: &EventsConfig, bot_id: &str) -> Result<Arc<dyn EventSink>> {
    match &config.webhook_url {
        Some(url) => {
            let sink = WebhookEventSink::new(url.clone(), config.api_key.clone(), bot_id.to_string())
                .context("Failed to create webhook event sink")?;
            Ok(Arc::new(sink))
        }
        None => {
            info!("No webhook configured, session events will only be logged");
            Ok(Arc::new(TracingEventSink))
        }
    }
}

/// Budgets from the config file plus the session's own waiting-room timeout.
pub fn session_timeouts(config: &Config, params: &SessionParams) -> SessionTimeouts {
    SessionTimeouts::from_config(
        &config.timeouts,
        params.automatic_leave.waiting_room_timeout,
    )
}

/// Run the session to completion. Serves the control API while it runs and
/// turns Ctrl-C into an API stop request.
pub async fn run_session(machine: Arc<MeetingStateMachine>, config: &Config) -> Result<SessionOutcome> {
    info!("Starting meetbot session");

    let api_task = if config.api.enabled {
        let server = ApiServer::new(machine.clone(), config.api.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("API server failed: {:#}", e);
            }
        }))
    } else {
        info!("Control API disabled");
        None
    };

    let signal_task = {
        let machine = machine.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupt received, stopping session");
                    machine.request_stop(MeetingEndReason::ApiRequest);
                }
                Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
            }
        })
    };

    let outcome = machine.start().await;

    signal_task.abort();
    if let Some(task) = api_task {
        task.abort();
    }

    let outcome = outcome.context("Session could not be started")?;
    if outcome.successful {
        info!("Session completed successfully");
    } else {
        warn!(
            "Session ended unsuccessfully: {}",
            outcome
                .error
                .as_deref()
                .unwrap_or("no error recorded")
        );
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::MeetingStateType;
    use crate::testing::TestSession;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_run_session_until_stopped() {
        let session = TestSession::new();
        let machine = Arc::new(session.machine());
        let mut config = Config::default();
        config.api.enabled = false;

        let runner = {
            let machine = machine.clone();
            tokio::spawn(async move { run_session(machine, &config).await })
        };

        machine
            .subscribe()
            .wait_for(|s| *s == MeetingStateType::Recording)
            .await
            .unwrap();
        machine.request_stop(MeetingEndReason::ApiRequest);

        let outcome = runner.await.unwrap().unwrap();
        assert!(outcome.successful);
        assert_eq!(outcome.end_reason, Some(MeetingEndReason::ApiRequest));
    }

    #[tokio::test]
    async fn test_run_session_twice_fails() {
        let session = TestSession::new();
        session.provider.reject_urls();
        let machine = Arc::new(session.machine());
        let mut config = Config::default();
        config.api.enabled = false;

        let first = run_session(machine.clone(), &config).await.unwrap();
        assert_eq!(first.end_reason, Some(MeetingEndReason::InvalidMeetingUrl));

        assert!(run_session(machine, &config).await.is_err());
    }

    #[test]
    fn test_session_timeouts_combine_config_and_params() {
        let mut config = Config::default();
        config.timeouts.max_pause_ms = 1_000;
        let mut params = SessionParams::new("https://meet.google.com/abc-defg-hij");
        params.automatic_leave.waiting_room_timeout = 5;

        let timeouts = session_timeouts(&config, &params);

        assert_eq!(timeouts.waiting_room, Duration::from_secs(5));
        assert_eq!(timeouts.max_pause, Duration::from_secs(1));
        assert_eq!(timeouts.setup, Duration::from_secs(30));
    }

    #[test]
    fn test_event_sink_selection() {
        let log_only = EventsConfig::default();
        assert!(build_event_sink(&log_only, "bot-1").is_ok());

        let webhook = EventsConfig {
            webhook_url: Some("http://127.0.0.1:9/hooks".to_string()),
            api_key: Some("secret".to_string()),
        };
        assert!(build_event_sink(&webhook, "bot-1").is_ok());
    }
}
