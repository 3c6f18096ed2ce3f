use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{bounded, StateHandler};
use crate::meeting::BrowserSession;
use crate::paths::PathManager;
use crate::state_machine::constants::{
    BROWSER_LAUNCH_ATTEMPTS, BROWSER_LAUNCH_TIMEOUT, BROWSER_RETRY_BACKOFF,
};
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingEndReason, MeetingStateType, StateTransition};

/// Prepares the session: directories, optional branding, browser.
pub struct InitializationState;

#[async_trait]
impl StateHandler for InitializationState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Initialization
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        if ctx.params.meeting_url.trim().is_empty() {
            ctx.status()
                .set_error(MeetingEndReason::InvalidMeetingUrl, "Missing meeting URL");
            bail!("Invalid meeting URL");
        }

        let paths = PathManager::for_session(
            &ctx.collaborators.storage,
            ctx.params.environ,
            &ctx.params.bot_uuid,
        );
        paths
            .initialize()
            .await
            .context("Failed to prepare session directories")?;
        ctx.path_manager = Some(paths);

        if ctx.params.custom_branding_bot_path.is_some() {
            setup_branding(ctx).await;
        }

        let session = launch_browser(ctx)
            .await
            .context("Browser initialization failed")?;
        ctx.browser_session = Some(session);

        Ok(StateTransition::to(MeetingStateType::WaitingRoom))
    }
}

/// Start the branding process and wait for it in the background. Never fatal.
async fn setup_branding(ctx: &mut MeetingContext) {
    let (Some(branding), Some(image)) = (
        ctx.collaborators.branding.clone(),
        ctx.params.custom_branding_bot_path.clone(),
    ) else {
        warn!("Branding image configured but no branding collaborator available");
        return;
    };

    let launch = bounded(
        BROWSER_LAUNCH_TIMEOUT,
        "branding launch",
        branding.launch(&image, &ctx.params.bot_name),
    )
    .await;

    match launch {
        Ok(process) => {
            ctx.branding = Some(process.clone());
            tokio::spawn(async move {
                match process.wait_ready().await {
                    Ok(()) => info!("Branding ready"),
                    Err(e) => warn!("Branding setup failed, continuing anyway: {:#}", e),
                }
            });
        }
        Err(e) => warn!("Branding setup failed, continuing anyway: {:#}", e),
    }
}

async fn launch_browser(ctx: &MeetingContext) -> Result<Arc<dyn BrowserSession>> {
    let launcher = ctx.collaborators.browser.clone();
    let mut last_error = None;

    for attempt in 1..=BROWSER_LAUNCH_ATTEMPTS {
        info!(
            "Browser setup attempt {}/{}",
            attempt, BROWSER_LAUNCH_ATTEMPTS
        );

        match bounded(
            BROWSER_LAUNCH_TIMEOUT,
            "browser launch",
            launcher.launch(&ctx.params),
        )
        .await
        {
            Ok(session) => {
                info!("Browser setup completed");
                return Ok(session);
            }
            Err(e) => {
                error!("Browser setup attempt {} failed: {:#}", attempt, e);
                last_error = Some(e);
            }
        }

        if attempt < BROWSER_LAUNCH_ATTEMPTS {
            let wait = BROWSER_RETRY_BACKOFF * attempt;
            info!("Waiting {:?} before retrying browser setup", wait);
            tokio::time::sleep(wait).await;
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("Browser setup failed after multiple attempts")))
}
