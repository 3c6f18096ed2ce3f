use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{bounded, StateHandler};
use crate::config::Environment;
use crate::paths::PathManager;
use crate::recording::RecorderError;
use crate::state_machine::constants::{BROWSER_CLOSE_TIMEOUT, RECORDER_STOP_TIMEOUT};
use crate::state_machine::context::MeetingContext;
use crate::state_machine::types::{MeetingStateType, StateTransition};

/// Best-effort teardown. Always ends in Terminated.
pub struct CleanupState;

#[async_trait]
impl StateHandler for CleanupState {
    fn state(&self) -> MeetingStateType {
        MeetingStateType::Cleanup
    }

    async fn run(&self, ctx: &mut MeetingContext) -> Result<StateTransition> {
        info!("Starting cleanup sequence");

        let limit = ctx.timeouts.cleanup;
        match tokio::time::timeout(limit, perform_cleanup(ctx)).await {
            Ok(()) => info!("Cleanup completed"),
            Err(_) => error!("Cleanup timed out after {}s", limit.as_secs()),
        }

        Ok(StateTransition::to(MeetingStateType::Terminated))
    }

    async fn handle_error(&self, _ctx: &mut MeetingContext, err: anyhow::Error) -> StateTransition {
        error!("Error during cleanup, terminating anyway: {:#}", err);
        StateTransition::to(MeetingStateType::Terminated)
    }
}

async fn perform_cleanup(ctx: &mut MeetingContext) {
    let stop_timeout = ctx.timeouts.component_stop;

    info!("Cleanup step 1/6: stopping dialog observer");
    if let Some(observer) = ctx.dialog_observer.take() {
        stop_within(
            stop_timeout,
            "dialog observer stop",
            observer.stop_global_dialog_observer(),
        )
        .await;
    }

    info!("Cleanup step 2/6: stopping recorder");
    if let Some(task) = ctx.recorder_start.take() {
        if !task.is_finished() {
            warn!("Recorder start still pending, aborting it");
            task.abort();
        }
    }
    stop_recorder(ctx).await;

    if let (Some(snapshots), Some(page)) = (ctx.snapshot_service(), ctx.page.clone()) {
        info!("Cleanup step 3/6: capturing final page state");
        snapshots
            .capture(page.as_ref(), "cleanup_final_dom_state")
            .await;
    }

    info!("Cleanup steps 4/6: stopping streaming, speakers observer and HTML cleaner");
    let streaming = ctx.streaming.take();
    let speakers = ctx.speakers_observer.take();
    let cleaner = ctx.html_cleaner.take();

    tokio::join!(
        async {
            if let Some(streaming) = streaming {
                stop_within(stop_timeout, "streaming stop", streaming.stop()).await;
            }
        },
        async {
            if let Some(observer) = speakers {
                stop_within(stop_timeout, "speakers observer stop", observer.stop_observing()).await;
            }
        },
        async {
            if let Some(cleaner) = cleaner {
                stop_within(stop_timeout, "HTML cleaner stop", cleaner.stop()).await;
            }
        },
    );

    info!("Cleanup step 5/6: production file cleanup");
    purge_production_files(ctx).await;

    info!("Cleanup step 6/6: releasing browser resources");
    release_browser(ctx).await;
}

async fn stop_within<F>(limit: Duration, what: &'static str, fut: F)
where
    F: std::future::Future<Output = Result<()>>,
{
    if let Err(e) = bounded(limit, what, fut).await {
        warn!("{} failed, continuing cleanup: {:#}", what, e);
    }
}

async fn stop_recorder(ctx: &MeetingContext) {
    let recorder = ctx.collaborators.recorder.clone();
    if !recorder.is_currently_recording() {
        debug!("Recorder not recording, nothing to stop");
        return;
    }

    match tokio::time::timeout(RECORDER_STOP_TIMEOUT, recorder.stop_recording()).await {
        Ok(Ok(())) => info!("Recorder stopped"),
        Ok(Err(RecorderError::NotRecording)) => info!("Recorder was already stopped"),
        Ok(Err(e)) => error!("Error stopping recorder, continuing cleanup: {}", e),
        Err(_) => error!(
            "Recorder stop timed out after {}s, continuing cleanup",
            RECORDER_STOP_TIMEOUT.as_secs()
        ),
    }
}

async fn purge_production_files(ctx: &MeetingContext) {
    let Some(paths) = &ctx.path_manager else {
        warn!("Path manager not available, skipping file cleanup");
        return;
    };

    if paths.environ() != Environment::Prod {
        debug!("Skipping file cleanup outside production");
        return;
    }

    for dir in paths.scratch_paths() {
        match PathManager::purge_directory(&dir).await {
            Ok(removed) if removed > 0 => info!("Removed {} entries from {:?}", removed, dir),
            Ok(_) => {}
            Err(e) => warn!("Failed to clean {:?}: {:#}", dir, e),
        }
    }
}

async fn release_browser(ctx: &mut MeetingContext) {
    if let Some(branding) = ctx.branding.take() {
        if let Err(e) = bounded(BROWSER_CLOSE_TIMEOUT, "branding stop", branding.kill()).await {
            warn!("Failed to stop branding: {:#}", e);
        }
    }

    let page = ctx.page.take();
    let browser = ctx.browser_session.take();

    tokio::join!(
        async {
            if let Some(page) = page {
                if let Err(e) = bounded(BROWSER_CLOSE_TIMEOUT, "page close", page.close()).await {
                    debug!("Page close failed: {:#}", e);
                }
            }
        },
        async {
            if let Some(browser) = browser {
                if let Err(e) = bounded(BROWSER_CLOSE_TIMEOUT, "browser close", browser.close()).await {
                    debug!("Browser close failed: {:#}", e);
                }
            }
        },
    );
}
