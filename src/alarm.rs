use std::{fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifies one scheduled alarm.
/// ids are handed to us by whoever schedules alarms, we never make them up.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AlarmId(pub i64);

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AlarmId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[inline]
#[must_use]
pub const fn always_true() -> bool {
    true
}

#[inline]
#[must_use]
pub const fn unit_scale() -> f64 {
    1.0
}

/// One point of a volume ramp: reach `volume` after `time_ms` of playback.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FadeStep {
    pub time_ms: u64,
    pub volume: f32,
}

impl FadeStep {
    #[must_use]
    pub const fn time(&self) -> Duration {
        Duration::from_millis(self.time_ms)
    }
}

/// What the audio channel plays for an alarm.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AudioSettings {
    pub path: PathBuf,
    #[serde(default = "always_true")]
    pub loop_audio: bool,
    /// linear fade in from silence, zero means start at full level
    #[serde(default)]
    pub fade_duration_ms: u64,
    #[serde(default)]
    pub fade_steps: Vec<FadeStep>,
    /// playback level of this alarm alone, 0 pauses the ring without stopping it
    #[serde(default)]
    pub volume: Option<f32>,
}

impl AudioSettings {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_audio: true,
            fade_duration_ms: 0,
            fade_steps: vec![],
            volume: None,
        }
    }

    #[must_use]
    pub const fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }
}

/// System volume override for the ringing episode.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct VolumeSettings {
    #[serde(default)]
    pub fixed_volume: Option<f32>,
    /// keep putting the level back if something else changes it
    #[serde(default)]
    pub enforced: bool,
}

/// Spoken label read out while the alarm rings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceAnnouncementSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default = "unit_scale")]
    pub volume: f64,
    #[serde(default = "unit_scale")]
    pub rate: f64,
    #[serde(default = "unit_scale")]
    pub pitch: f64,
    #[serde(default)]
    pub loop_speech: bool,
    #[serde(default = "VoiceAnnouncementSettings::default_interval")]
    pub loop_interval_ms: u64,
}

impl VoiceAnnouncementSettings {
    #[must_use]
    pub const fn default_interval() -> u64 {
        1_000
    }
}

impl Default for VoiceAnnouncementSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            text: String::new(),
            volume: 1.0,
            rate: 1.0,
            pitch: 1.0,
            loop_speech: false,
            loop_interval_ms: Self::default_interval(),
        }
    }
}

/// Periodic read out of the current time, to put some pressure on whoever is
/// still in bed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TimeAnnouncementSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "TimeAnnouncementSettings::default_volume")]
    pub volume: f64,
    #[serde(default = "unit_scale")]
    pub rate: f64,
    #[serde(default = "unit_scale")]
    pub pitch: f64,
    #[serde(default = "always_true")]
    pub loop_speech: bool,
    #[serde(default = "TimeAnnouncementSettings::default_interval")]
    pub loop_interval_ms: u64,
}

impl TimeAnnouncementSettings {
    #[must_use]
    pub const fn default_volume() -> f64 {
        0.8
    }

    #[must_use]
    pub const fn default_interval() -> u64 {
        10_000
    }
}

impl Default for TimeAnnouncementSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            volume: Self::default_volume(),
            rate: 1.0,
            pitch: 1.0,
            loop_speech: true,
            loop_interval_ms: Self::default_interval(),
        }
    }
}

/// Everything needed to ring one alarm, already decoded.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AlarmConfiguration {
    pub id: AlarmId,
    #[serde(default)]
    pub allow_overlap: bool,
    pub audio: AudioSettings,
    #[serde(default)]
    pub volume: VolumeSettings,
    #[serde(default = "always_true")]
    pub vibrate: bool,
    #[serde(default)]
    pub flashlight: bool,
    #[serde(default)]
    pub voice_announcement: VoiceAnnouncementSettings,
    #[serde(default)]
    pub time_announcement: TimeAnnouncementSettings,
    #[serde(default)]
    pub full_screen_presentation: bool,
}

impl AlarmConfiguration {
    #[must_use]
    pub fn new(id: impl Into<AlarmId>, audio: AudioSettings) -> Self {
        Self {
            id: id.into(),
            allow_overlap: false,
            audio,
            volume: VolumeSettings::default(),
            vibrate: true,
            flashlight: false,
            voice_announcement: VoiceAnnouncementSettings::default(),
            time_announcement: TimeAnnouncementSettings::default(),
            full_screen_presentation: false,
        }
    }

    /// Decodes alarm settings handed over by the host.
    ///
    /// # Errors
    /// [`Error::ConfigurationMissing`] if the document is malformed or lacks the
    /// id or audio path.
    pub fn from_toml(settings: &str) -> Result<Self, Error> {
        toml::from_str(settings).map_err(|e| Error::ConfigurationMissing(e.message().to_string()))
    }
}
