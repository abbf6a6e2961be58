//! # Channel drivers
//!
//! A channel is one ringing modality. The core never talks to hardware, it
//! calls the narrow driver traits below and treats every call as fallible.
//!
//! [`Channels`] is the capability set of the running session: whatever
//! drivers the platform has. A missing driver is not an error, the steps that
//! need it are skipped.

use std::{collections::BTreeSet, fmt, sync::Arc, time::Duration};

use crate::{
    alarm::{AlarmId, AudioSettings, TimeAnnouncementSettings, VoiceAnnouncementSettings},
    error::ChannelError,
};

pub type ChannelResult = Result<(), ChannelError>;

/// Called by the audio driver when playback of an alarm ran out on its own.
pub type CompletionCallback = Box<dyn Fn(AlarmId) + Send + Sync>;

/// Ringing modalities tracked per alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Audio,
    Vibration,
    Flashlight,
    VoiceAnnouncement,
    TimeAnnouncement,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Vibration => "vibration",
            Self::Flashlight => "flashlight",
            Self::VoiceAnnouncement => "voice announcement",
            Self::TimeAnnouncement => "time announcement",
        })
    }
}

/// Vibration timings in milliseconds, alternating wait and vibrate, starting
/// with a wait. `repeat` is the index the pattern loops back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationPattern {
    pub timings: &'static [u64],
    pub repeat: Option<usize>,
}

impl VibrationPattern {
    /// Buzz for half a second, pause for half a second, forever.
    pub const ALARM: Self = Self {
        timings: &[0, 500, 500],
        repeat: Some(1),
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnouncementText {
    Fixed(String),
    /// Rendered by the announcer from the wall clock each time it speaks.
    CurrentTime,
}

/// What an [`Announcer`] should say and how.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub alarm: AlarmId,
    pub text: AnnouncementText,
    pub volume: f64,
    pub rate: f64,
    pub pitch: f64,
    pub loop_speech: bool,
    pub loop_interval: Duration,
    /// lower alarm audio to this level while speaking
    pub duck_audio: Option<f32>,
}

impl Announcement {
    #[must_use]
    pub fn voice(alarm: AlarmId, settings: &VoiceAnnouncementSettings) -> Self {
        Self {
            alarm,
            text: AnnouncementText::Fixed(settings.text.clone()),
            volume: settings.volume,
            rate: settings.rate,
            pitch: settings.pitch,
            loop_speech: settings.loop_speech,
            loop_interval: Duration::from_millis(settings.loop_interval_ms),
            duck_audio: None,
        }
    }

    #[must_use]
    pub fn time(alarm: AlarmId, settings: &TimeAnnouncementSettings, duck_level: f32) -> Self {
        Self {
            alarm,
            text: AnnouncementText::CurrentTime,
            volume: settings.volume,
            rate: settings.rate,
            pitch: settings.pitch,
            loop_speech: settings.loop_speech,
            loop_interval: Duration::from_millis(settings.loop_interval_ms),
            duck_audio: Some(duck_level),
        }
    }
}

/// Alarm sound playback, one stream per alarm id.
pub trait AudioChannel: Send + Sync {
    /// Start (or restart) playback for `id`.
    fn play(&self, id: AlarmId, settings: &AudioSettings) -> ChannelResult;

    fn stop(&self, id: AlarmId) -> ChannelResult;

    /// Ids with a live playback, as the driver sees them.
    fn currently_playing(&self) -> Vec<AlarmId>;

    fn is_empty(&self) -> bool {
        self.currently_playing().is_empty()
    }

    /// Replaces the completion listener. Only one listener is kept.
    fn on_complete(&self, callback: CompletionCallback) -> ChannelResult;

    /// Temporarily lower every playback to `level` of its own volume.
    fn duck(&self, level: f32) -> ChannelResult;

    fn unduck(&self) -> ChannelResult;

    /// Stop everything and drop every resource held by the driver.
    fn release_all(&self) -> ChannelResult;
}

pub trait VibrationChannel: Send + Sync {
    fn start(&self, pattern: &VibrationPattern) -> ChannelResult;
    fn stop(&self) -> ChannelResult;
}

/// The process wide output volume and audio focus.
///
/// The driver keeps the level it found before the last [`apply`](Self::apply),
/// [`restore`](Self::restore) puts that level back.
pub trait VolumeChannel: Send + Sync {
    fn current(&self) -> Result<f32, ChannelError>;
    fn apply(&self, level: f32, enforced: bool) -> ChannelResult;
    fn restore(&self) -> ChannelResult;
    fn request_focus(&self) -> ChannelResult;
    fn release_focus(&self) -> ChannelResult;
}

pub trait FlashlightChannel: Send + Sync {
    fn on(&self) -> ChannelResult;
    /// Must be a no-op when already off.
    fn off(&self) -> ChannelResult;
}

/// Text to speech output.
pub trait Announcer: Send + Sync {
    fn start(&self, announcement: &Announcement) -> ChannelResult;
    fn stop(&self) -> ChannelResult;
}

/// Drivers available to this session.
#[derive(Clone, Default)]
pub struct Channels {
    pub audio: Option<Arc<dyn AudioChannel>>,
    pub vibration: Option<Arc<dyn VibrationChannel>>,
    pub volume: Option<Arc<dyn VolumeChannel>>,
    pub flashlight: Option<Arc<dyn FlashlightChannel>>,
    pub voice: Option<Arc<dyn Announcer>>,
    pub time: Option<Arc<dyn Announcer>>,
}

impl Channels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_audio(mut self, audio: Arc<dyn AudioChannel>) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_vibration(mut self, vibration: Arc<dyn VibrationChannel>) -> Self {
        self.vibration = Some(vibration);
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Arc<dyn VolumeChannel>) -> Self {
        self.volume = Some(volume);
        self
    }

    #[must_use]
    pub fn with_flashlight(mut self, flashlight: Arc<dyn FlashlightChannel>) -> Self {
        self.flashlight = Some(flashlight);
        self
    }

    #[must_use]
    pub fn with_voice(mut self, voice: Arc<dyn Announcer>) -> Self {
        self.voice = Some(voice);
        self
    }

    #[must_use]
    pub fn with_time(mut self, time: Arc<dyn Announcer>) -> Self {
        self.time = Some(time);
        self
    }

    /// Channels that can be engaged with the drivers at hand.
    #[must_use]
    pub fn available(&self) -> BTreeSet<Channel> {
        [
            (Channel::Audio, self.audio.is_some()),
            (Channel::Vibration, self.vibration.is_some()),
            (Channel::Flashlight, self.flashlight.is_some()),
            (Channel::VoiceAnnouncement, self.voice.is_some()),
            (Channel::TimeAnnouncement, self.time.is_some()),
        ]
        .into_iter()
        .filter_map(|(channel, present)| present.then_some(channel))
        .collect()
    }

    /// The announcer behind an announcement channel.
    pub(crate) fn announcer(&self, channel: Channel) -> Option<&Arc<dyn Announcer>> {
        match channel {
            Channel::VoiceAnnouncement => self.voice.as_ref(),
            Channel::TimeAnnouncement => self.time.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels")
            .field("available", &self.available())
            .field("volume", &self.volume.is_some())
            .finish()
    }
}
