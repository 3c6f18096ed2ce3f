//! Timing budgets for the session lifecycle.
//!
//! These are the compiled-in defaults. `SessionTimeouts` lets the `[timeouts]`
//! config section and the per-session parameters override most of them.

use std::time::Duration;

pub const SETUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const RECORDING_TIMEOUT: Duration = Duration::from_secs(4 * 3600);
pub const INITIAL_WAIT_TIME: Duration = Duration::from_secs(7 * 60);
pub const SILENCE_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(3600);
/// Longest a recording may stay paused before it is forced back to Resuming.
pub const MAX_PAUSE_DURATION: Duration = Duration::from_secs(3600);
pub const EMPTY_MEETING_CONFIRMATION: Duration = Duration::from_secs(30);

/// Observer and cleaner stop budget during teardown.
pub const COMPONENT_STOP_TIMEOUT: Duration = Duration::from_millis(3000);
/// Combined budget for the pause and resume side effects.
pub const PAUSE_RESUME_TIMEOUT: Duration = Duration::from_millis(20_000);

pub const BROWSER_LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const BROWSER_LAUNCH_ATTEMPTS: u32 = 3;
pub const BROWSER_RETRY_BACKOFF: Duration = Duration::from_secs(5);
pub const PAGE_OPEN_TIMEOUT: Duration = Duration::from_secs(60);
pub const BROWSER_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
/// Dialog observer and streaming start-up.
pub const COMPONENT_START_TIMEOUT: Duration = Duration::from_secs(10);

/// Once the join has been signalled, how long the join call may still take.
pub const JOIN_SETTLE_GRACE: Duration = Duration::from_secs(30);
pub const BOT_REMOVED_CHECK_TIMEOUT: Duration = Duration::from_secs(10);
pub const RECORDER_START_TIMEOUT: Duration = Duration::from_secs(60);
pub const RECORDER_STOP_TIMEOUT: Duration = Duration::from_secs(120);
pub const ERROR_NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);
pub const EVENT_EMIT_TIMEOUT: Duration = Duration::from_secs(5);
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

pub const WAITING_ROOM_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const RECORDING_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Sound level (0-100) above which the room counts as active.
pub const SOUND_LEVEL_ACTIVITY_THRESHOLD: f32 = 5.0;

/// Default waiting-room budget in seconds when the session does not set one.
pub const DEFAULT_WAITING_ROOM_TIMEOUT_SECS: u64 = 600;
