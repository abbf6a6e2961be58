use serde::{Deserialize, Serialize};

use crate::{
    alarm::{AlarmId, AudioSettings, TimeAnnouncementSettings, VoiceAnnouncementSettings},
    error::Error,
};

/// Changes to apply to an alarm that is ringing right now.
/// every field left as `None` is left alone, the id and overlap policy can't be changed
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct EditSettings {
    pub id: AlarmId,
    #[serde(default)]
    pub vibrate: Option<bool>,
    #[serde(default)]
    pub flashlight: Option<bool>,
    /// replaces the sound, restarting playback with the new parameters
    #[serde(default)]
    pub audio: Option<AudioSettings>,
    #[serde(default)]
    pub voice_announcement: Option<VoiceAnnouncementSettings>,
    #[serde(default)]
    pub time_announcement: Option<TimeAnnouncementSettings>,
}

impl EditSettings {
    #[must_use]
    pub fn new(id: impl Into<AlarmId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn vibrate(mut self, on: bool) -> Self {
        self.vibrate = Some(on);
        self
    }

    #[must_use]
    pub const fn flashlight(mut self, on: bool) -> Self {
        self.flashlight = Some(on);
        self
    }

    #[must_use]
    pub fn audio(mut self, audio: AudioSettings) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn voice_announcement(mut self, voice: VoiceAnnouncementSettings) -> Self {
        self.voice_announcement = Some(voice);
        self
    }

    #[must_use]
    pub const fn time_announcement(mut self, time: TimeAnnouncementSettings) -> Self {
        self.time_announcement = Some(time);
        self
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.vibrate.is_none()
            && self.flashlight.is_none()
            && self.audio.is_none()
            && self.voice_announcement.is_none()
            && self.time_announcement.is_none()
    }

    /// Decodes an edit request handed over by the host.
    ///
    /// # Errors
    /// [`Error::ConfigurationMissing`] if the document is malformed or lacks the id.
    pub fn from_toml(settings: &str) -> Result<Self, Error> {
        toml::from_str(settings).map_err(|e| Error::ConfigurationMissing(e.message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_without_id_is_rejected() {
        let err = EditSettings::from_toml("vibrate = false").unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }

    #[test]
    fn only_named_fields_are_set() {
        let edit = EditSettings::from_toml("id = 4\nflashlight = true").unwrap();
        assert_eq!(edit.id, AlarmId(4));
        assert_eq!(edit.flashlight, Some(true));
        assert_eq!(edit.vibrate, None);
        assert!(edit.audio.is_none());
        assert!(!edit.is_empty());
        assert!(EditSettings::new(4).is_empty());
    }

    #[test]
    fn audio_replacement_decodes_nested_table() {
        let edit = EditSettings::from_toml(
            r#"
            id = 9

            [audio]
            path = "/tmp/rain.mp3"
            loop_audio = false
            volume = 0.0
            "#,
        )
        .unwrap();
        let audio = edit.audio.unwrap();
        assert!(!audio.loop_audio);
        assert_eq!(audio.volume, Some(0.0));
    }
}
