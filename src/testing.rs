//! In-memory collaborators for state handler and machine tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

use crate::config::{RecordingMode, SessionParams, SessionTimeouts};
use crate::events::{BotEvent, EventSink};
use crate::meeting::{
    BrowserLauncher, BrowserSession, CancelCheck, DialogObserver, HtmlCleaner, JoinNotifier,
    MeetingProvider, MeetingRef, Page, ProviderError, SpeakersCallback, SpeakersObserver,
};
use crate::paths::{PathManager, StorageRoots};
use crate::recording::{Branding, BrandingProcess, Recorder, RecorderError, StreamingService};
use crate::state_machine::states::{InCallState, StateHandler};
use crate::state_machine::{
    Collaborators, MeetingContext, MeetingStateMachine, MeetingStateType, SessionShared,
    SessionStatus,
};

pub const TEST_MEETING_URL: &str = "https://meet.google.com/abc-defg-hij";

fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

// Page

pub struct MockPage {
    content: Option<String>,
    closed: AtomicBool,
}

impl MockPage {
    pub fn with_content(html: &str) -> Self {
        Self {
            content: Some(html.to_string()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing_content() -> Self {
        Self {
            content: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn close_now(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed_now(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Page for MockPage {
    async fn content(&self) -> Result<String> {
        self.content
            .clone()
            .ok_or_else(|| anyhow!("page crashed"))
    }

    fn is_closed(&self) -> bool {
        self.is_closed_now()
    }

    async fn close(&self) -> Result<()> {
        self.close_now();
        Ok(())
    }
}

// Browser

#[derive(Default)]
pub struct MockBrowserSession {
    closes: AtomicUsize,
}

#[async_trait]
impl BrowserSession for MockBrowserSession {
    async fn close(&self) -> Result<()> {
        bump(&self.closes);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockBrowser {
    session: Arc<MockBrowserSession>,
    fail_remaining: AtomicUsize,
    launches: AtomicUsize,
}

impl MockBrowser {
    pub fn fail_first(&self, attempts: usize) {
        self.fail_remaining.store(attempts, Ordering::SeqCst);
    }

    pub fn launches(&self) -> usize {
        count(&self.launches)
    }

    pub fn closes(&self) -> usize {
        count(&self.session.closes)
    }
}

#[async_trait]
impl BrowserLauncher for MockBrowser {
    async fn launch(&self, _params: &SessionParams) -> Result<Arc<dyn BrowserSession>> {
        bump(&self.launches);
        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("chrome exited during startup");
        }
        Ok(self.session.clone())
    }
}

// Branding

#[derive(Default)]
pub struct MockBrandingProcess {
    kills: AtomicUsize,
}

#[async_trait]
impl BrandingProcess for MockBrandingProcess {
    async fn wait_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        bump(&self.kills);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockBranding {
    process: Arc<MockBrandingProcess>,
    fail: AtomicBool,
}

impl MockBranding {
    pub fn fail_launch(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn kills(&self) -> usize {
        count(&self.process.kills)
    }
}

#[async_trait]
impl Branding for MockBranding {
    async fn launch(&self, _image_path: &str, _bot_name: &str) -> Result<Arc<dyn BrandingProcess>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("virtual camera unavailable");
        }
        Ok(self.process.clone())
    }
}

// Provider

pub enum JoinBehavior {
    /// Never admitted.
    Hang,
    /// Admitted after the delay, but the join call never returns.
    SignalThenHang(Duration),
    Succeed(Duration),
    Fail(ProviderError),
}

pub struct MockProvider {
    page: Arc<MockPage>,
    join: Mutex<JoinBehavior>,
    reject_urls: AtomicBool,
    ends_at: Mutex<Option<Instant>>,
    fail_end_check: AtomicBool,
    hang_end_check: AtomicBool,
    closes: AtomicUsize,
}

impl MockProvider {
    fn new(page: Arc<MockPage>) -> Self {
        Self {
            page,
            join: Mutex::new(JoinBehavior::Succeed(Duration::from_secs(1))),
            reject_urls: AtomicBool::new(false),
            ends_at: Mutex::new(None),
            fail_end_check: AtomicBool::new(false),
            hang_end_check: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn set_join(&self, behavior: JoinBehavior) {
        *self.join.lock().unwrap() = behavior;
    }

    pub fn reject_urls(&self) {
        self.reject_urls.store(true, Ordering::SeqCst);
    }

    /// The call reports itself ended once `delay` has passed.
    pub fn end_meeting_after(&self, delay: Duration) {
        *self.ends_at.lock().unwrap() = Some(Instant::now() + delay);
    }

    /// Every end-of-meeting check fails with a provider error.
    pub fn fail_end_check(&self) {
        self.fail_end_check.store(true, Ordering::SeqCst);
    }

    /// Every end-of-meeting check stalls.
    pub fn hang_end_check(&self) {
        self.hang_end_check.store(true, Ordering::SeqCst);
    }

    pub fn closes(&self) -> usize {
        count(&self.closes)
    }
}

#[async_trait]
impl MeetingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn parse_meeting_url(&self, url: &str) -> Result<MeetingRef, ProviderError> {
        if self.reject_urls.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidMeetingUrl(url.to_string()));
        }
        Ok(MeetingRef {
            meeting_id: "abc-defg-hij".to_string(),
            password: None,
        })
    }

    fn meeting_link(&self, meeting: &MeetingRef, _bot_name: &str) -> String {
        format!("https://meet.google.com/{}", meeting.meeting_id)
    }

    async fn open_meeting_page(
        &self,
        _browser: Arc<dyn BrowserSession>,
        _link: &str,
        _streaming_input: Option<&str>,
    ) -> Result<Arc<dyn Page>, ProviderError> {
        let page: Arc<dyn Page> = self.page.clone();
        Ok(page)
    }

    async fn join_meeting(
        &self,
        _page: Arc<dyn Page>,
        _params: &SessionParams,
        _cancel_check: CancelCheck,
        on_join_success: JoinNotifier,
    ) -> Result<(), ProviderError> {
        let behavior = std::mem::replace(&mut *self.join.lock().unwrap(), JoinBehavior::Hang);
        match behavior {
            JoinBehavior::Hang => std::future::pending().await,
            JoinBehavior::SignalThenHang(delay) => {
                tokio::time::sleep(delay).await;
                on_join_success();
                std::future::pending().await
            }
            JoinBehavior::Succeed(delay) => {
                tokio::time::sleep(delay).await;
                on_join_success();
                Ok(())
            }
            JoinBehavior::Fail(err) => Err(err),
        }
    }

    async fn find_end_meeting(&self, _page: Arc<dyn Page>) -> Result<bool, ProviderError> {
        if self.hang_end_check.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_end_check.load(Ordering::SeqCst) {
            return Err(ProviderError::Navigation("page detached".to_string()));
        }
        let ends_at = *self.ends_at.lock().unwrap();
        Ok(ends_at.map(|at| Instant::now() >= at).unwrap_or(false))
    }

    async fn close_meeting(&self, _page: Arc<dyn Page>) {
        bump(&self.closes);
    }
}

// Recorder

enum StopBehavior {
    Stop,
    NotRecording,
    Fail(String),
    Hang,
}

pub struct MockRecorder {
    recording: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    start_time: Mutex<Option<i64>>,
    last_error: Mutex<Option<String>>,
    stop: Mutex<StopBehavior>,
    hang_start: AtomicBool,
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self {
            recording: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            start_time: Mutex::new(None),
            last_error: Mutex::new(None),
            stop: Mutex::new(StopBehavior::Stop),
            hang_start: AtomicBool::new(false),
        }
    }
}

impl MockRecorder {
    pub fn starts(&self) -> usize {
        count(&self.starts)
    }

    pub fn stops(&self) -> usize {
        count(&self.stops)
    }

    pub fn meeting_start_time(&self) -> Option<i64> {
        *self.start_time.lock().unwrap()
    }

    pub fn report_error(&self, message: &str) {
        *self.last_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_stop(&self, message: &str) {
        *self.stop.lock().unwrap() = StopBehavior::Fail(message.to_string());
    }

    pub fn stop_with_not_recording(&self) {
        *self.stop.lock().unwrap() = StopBehavior::NotRecording;
    }

    pub fn hang_stop(&self) {
        *self.stop.lock().unwrap() = StopBehavior::Hang;
    }

    pub fn hang_start(&self) {
        self.hang_start.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Recorder for MockRecorder {
    async fn start_recording(&self, _page: Arc<dyn Page>) -> Result<()> {
        bump(&self.starts);
        if self.hang_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_recording(&self) -> Result<(), RecorderError> {
        bump(&self.stops);
        let outcome = match &*self.stop.lock().unwrap() {
            StopBehavior::Stop => Some(Ok(())),
            StopBehavior::NotRecording => Some(Err(RecorderError::NotRecording)),
            StopBehavior::Fail(message) => Some(Err(RecorderError::Failed(message.clone()))),
            StopBehavior::Hang => None,
        };
        match outcome {
            Some(result) => {
                self.recording.store(false, Ordering::SeqCst);
                result
            }
            None => std::future::pending().await,
        }
    }

    fn is_currently_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn set_meeting_start_time(&self, timestamp: i64) {
        *self.start_time.lock().unwrap() = Some(timestamp);
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

// Observers

#[derive(Default)]
pub struct MockSpeakers {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    hang_stop: AtomicBool,
}

impl MockSpeakers {
    pub fn starts(&self) -> usize {
        count(&self.starts)
    }

    pub fn stops(&self) -> usize {
        count(&self.stops)
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn hang_stop(&self) {
        self.hang_stop.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeakersObserver for MockSpeakers {
    async fn start_observing(
        &self,
        _page: Arc<dyn Page>,
        _mode: RecordingMode,
        _bot_name: &str,
        _on_change: SpeakersCallback,
    ) -> Result<()> {
        bump(&self.starts);
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("participant list not found");
        }
        Ok(())
    }

    async fn stop_observing(&self) -> Result<()> {
        bump(&self.stops);
        if self.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCleaner {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    hang_start: AtomicBool,
    hang_stop: AtomicBool,
}

impl MockCleaner {
    pub fn stops(&self) -> usize {
        count(&self.stops)
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn hang_start(&self) {
        self.hang_start.store(true, Ordering::SeqCst);
    }

    pub fn hang_stop(&self) {
        self.hang_stop.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl HtmlCleaner for MockCleaner {
    async fn start(&self, _page: Arc<dyn Page>) -> Result<()> {
        bump(&self.starts);
        if self.hang_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("cleaner script rejected");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        bump(&self.stops);
        if self.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDialog {
    setups: AtomicUsize,
    stops: AtomicUsize,
}

impl MockDialog {
    pub fn setups(&self) -> usize {
        count(&self.setups)
    }

    pub fn stops(&self) -> usize {
        count(&self.stops)
    }
}

#[async_trait]
impl DialogObserver for MockDialog {
    async fn setup_global_dialog_observer(&self) -> Result<()> {
        bump(&self.setups);
        Ok(())
    }

    async fn stop_global_dialog_observer(&self) -> Result<()> {
        bump(&self.stops);
        Ok(())
    }
}

// Streaming

#[derive(Default)]
pub struct MockStreaming {
    starts: AtomicUsize,
    pauses: AtomicUsize,
    resumes: AtomicUsize,
    stops: AtomicUsize,
    sound_level: Mutex<f32>,
    hang_pause: AtomicBool,
    fail_resume: AtomicBool,
    hang_stop: AtomicBool,
}

impl MockStreaming {
    pub fn starts(&self) -> usize {
        count(&self.starts)
    }

    pub fn pauses(&self) -> usize {
        count(&self.pauses)
    }

    pub fn resumes(&self) -> usize {
        count(&self.resumes)
    }

    pub fn stops(&self) -> usize {
        count(&self.stops)
    }

    pub fn set_sound_level(&self, level: f32) {
        *self.sound_level.lock().unwrap() = level;
    }

    pub fn hang_pause(&self) {
        self.hang_pause.store(true, Ordering::SeqCst);
    }

    pub fn fail_resume(&self) {
        self.fail_resume.store(true, Ordering::SeqCst);
    }

    pub fn hang_stop(&self) {
        self.hang_stop.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamingService for MockStreaming {
    async fn start(&self) -> Result<()> {
        bump(&self.starts);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        bump(&self.pauses);
        if self.hang_pause.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        bump(&self.resumes);
        if self.fail_resume.load(Ordering::SeqCst) {
            bail!("stream endpoint went away");
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        bump(&self.stops);
        if self.hang_stop.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn current_sound_level(&self) -> f32 {
        *self.sound_level.lock().unwrap()
    }
}

// Events

#[derive(Default)]
pub struct MockEvents {
    events: Mutex<Vec<BotEvent>>,
    hang: AtomicBool,
}

impl MockEvents {
    pub fn events(&self) -> Vec<BotEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.events().iter().map(BotEvent::code).collect()
    }

    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventSink for MockEvents {
    async fn emit(&self, event: BotEvent) -> Result<()> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// One session's worth of mocks plus a scratch directory for its files.
pub struct TestSession {
    pub status: SessionStatus,
    pub page: Arc<MockPage>,
    pub browser: Arc<MockBrowser>,
    pub branding: Arc<MockBranding>,
    pub provider: Arc<MockProvider>,
    pub recorder: Arc<MockRecorder>,
    pub speakers: Arc<MockSpeakers>,
    pub cleaner: Arc<MockCleaner>,
    pub dialog: Arc<MockDialog>,
    pub streaming: Arc<MockStreaming>,
    pub events: Arc<MockEvents>,
    dir: TempDir,
}

impl TestSession {
    pub fn new() -> Self {
        let page = Arc::new(MockPage::with_content("<html><body>meeting</body></html>"));
        Self {
            status: SessionStatus::new(),
            provider: Arc::new(MockProvider::new(page.clone())),
            page,
            browser: Arc::default(),
            branding: Arc::default(),
            recorder: Arc::default(),
            speakers: Arc::default(),
            cleaner: Arc::default(),
            dialog: Arc::default(),
            streaming: Arc::default(),
            events: Arc::default(),
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn params(&self) -> SessionParams {
        let mut params = SessionParams::new(TEST_MEETING_URL);
        params.bot_uuid = "test-bot".to_string();
        params
    }

    pub fn storage(&self) -> StorageRoots {
        StorageRoots {
            efs_mount_point: self.dir.path().join("efs"),
            local_root: self.dir.path().join("local"),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            browser: self.browser.clone(),
            recorder: self.recorder.clone(),
            speakers_observer: self.speakers.clone(),
            html_cleaner: self.cleaner.clone(),
            dialog_observer: self.dialog.clone(),
            streaming: Some(self.streaming.clone()),
            branding: Some(self.branding.clone()),
            events: self.events.clone(),
            storage: self.storage(),
        }
    }

    pub fn browser_session(&self) -> Arc<dyn BrowserSession> {
        self.browser.session.clone()
    }

    pub fn streaming_handle(&self) -> Arc<dyn StreamingService> {
        self.streaming.clone()
    }

    /// Fresh context in Initialization.
    pub fn context(&self) -> MeetingContext {
        MeetingContext::new(
            self.params(),
            SessionTimeouts::default(),
            self.provider.clone(),
            self.collaborators(),
            Arc::new(SessionShared::new(self.status.clone())),
        )
    }

    /// Context as WaitingRoom leaves it: browser, page and directories ready.
    pub async fn joined_context(&self) -> MeetingContext {
        let mut ctx = self.context();
        ctx.browser_session = Some(self.browser_session());
        ctx.page = Some(self.page.clone());

        let paths = PathManager::for_session(&self.storage(), ctx.params.environ, &ctx.params.bot_uuid);
        paths.initialize().await.unwrap();
        ctx.path_manager = Some(paths);

        ctx.shared.set_state(MeetingStateType::InCall);
        ctx
    }

    /// Context as InCall leaves it, with every component running.
    pub async fn recording_context(&self) -> MeetingContext {
        let mut ctx = self.joined_context().await;
        self.recorder.start_recording(self.page.clone()).await.unwrap();
        ctx.dialog_observer = Some(self.dialog.clone());
        ctx.streaming = Some(self.streaming_handle());

        let transition = InCallState.execute(&mut ctx).await.unwrap();
        assert_eq!(transition.next_state, MeetingStateType::Recording);
        ctx.shared.set_state(MeetingStateType::Recording);
        ctx
    }

    pub fn machine(&self) -> MeetingStateMachine {
        self.machine_with(SessionTimeouts::default())
    }

    pub fn machine_with(&self, timeouts: SessionTimeouts) -> MeetingStateMachine {
        MeetingStateMachine::new(
            self.params(),
            timeouts,
            self.provider.clone(),
            self.collaborators(),
            self.status.clone(),
        )
    }
}
