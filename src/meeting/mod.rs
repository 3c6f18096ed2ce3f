//! Meeting-side collaborators: the platform provider, browser handles and
//! in-page observers, plus URL recognition and speaker tracking.

pub mod browser;
pub mod meeting_url;
pub mod observers;
pub mod provider;
pub mod speakers;

pub use browser::{BrowserLauncher, BrowserSession, Page};
pub use meeting_url::{detect_platform, parse_meet_url, MeetUrlParser, MeetingPlatform};
pub use observers::{DialogObserver, HtmlCleaner, SpeakerSnapshot, SpeakersCallback, SpeakersObserver};
pub use provider::{CancelCheck, JoinNotifier, MeetingProvider, MeetingRef, ProviderError};
pub use speakers::SpeakerTracker;
