//! Drivers for a desktop session: rodio playback, a software master volume,
//! console announcements and a terminal session. There is no vibrator or
//! torch on a desktop, those channels stay empty.

mod announcer;
mod audio;
mod session;
mod volume;

pub use announcer::{format_time_text, ConsoleAnnouncer};
pub use audio::{fade_level, RodioAudio};
pub use session::ConsoleSession;
pub use volume::SoftwareVolume;
