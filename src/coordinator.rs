//! # Alarm trigger coordinator
//!
//! Decides whether a firing alarm may ring and, once admitted, brings its
//! channels up in a fixed order:
//!
//! ```text
//! Volume → AudioFocus → CompletionListener → Flashlight → Audio
//!        → RefreshRinging → Vibration → VoiceAnnouncement
//!        → TimeAnnouncement → Presentation → WakeLock
//! ```
//!
//! Later steps may rely on earlier ones (the volume is set before audio
//! starts, the torch is lit before the first audio frame). A failing step is
//! logged and the rest still run: a half working alarm beats a silent one.
//!
//! Edits touch only the channels they name, in the order vibration,
//! flashlight, audio, voice announcement, time announcement.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    alarm::{AlarmConfiguration, AlarmId},
    alarm_edit::EditSettings,
    channel::{Announcement, Channel, ChannelResult, Channels, CompletionCallback, VibrationPattern},
    error::Error,
    notify::{self, Notifier},
    registry::Registry,
    session::Session,
    step::{ActivationReport, EditReport, StepReport},
};

/// Loop flag of every alarm whose audio was started, shared with the audio
/// completion listener.
pub(crate) type LoopFlags = Arc<Mutex<HashMap<AlarmId, bool>>>;

/// Session wide knobs of the ringing behaviour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingOptions {
    /// how long the device is kept awake after an alarm fires
    pub wake_lock: Duration,
    /// audio level while the time is being announced
    pub duck_level: f32,
}

impl Default for RingOptions {
    fn default() -> Self {
        Self {
            wake_lock: Duration::from_secs(5 * 60),
            duck_level: 0.1,
        }
    }
}

/// Why an alarm was not allowed to ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another alarm is ringing and this one does not allow overlap.
    Overlap,
}

/// Outcome of a fire event.
#[derive(Debug)]
#[must_use]
pub enum Admission {
    Admitted(ActivationReport),
    Rejected(RejectReason),
}

impl Admission {
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStep {
    Volume,
    AudioFocus,
    CompletionListener,
    Flashlight,
    Audio,
    RefreshRinging,
    Vibration,
    VoiceAnnouncement,
    TimeAnnouncement,
    Presentation,
    WakeLock,
}

impl ActivationStep {
    pub const ORDER: [Self; 11] = [
        Self::Volume,
        Self::AudioFocus,
        Self::CompletionListener,
        Self::Flashlight,
        Self::Audio,
        Self::RefreshRinging,
        Self::Vibration,
        Self::VoiceAnnouncement,
        Self::TimeAnnouncement,
        Self::Presentation,
        Self::WakeLock,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::AudioFocus => "audio focus",
            Self::CompletionListener => "completion listener",
            Self::Flashlight => "flashlight",
            Self::Audio => "audio",
            Self::RefreshRinging => "refresh ringing",
            Self::Vibration => "vibration",
            Self::VoiceAnnouncement => "voice announcement",
            Self::TimeAnnouncement => "time announcement",
            Self::Presentation => "presentation",
            Self::WakeLock => "wake lock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
    Vibration,
    Flashlight,
    Audio,
    VoiceAnnouncement,
    TimeAnnouncement,
}

impl EditStep {
    pub const ORDER: [Self; 5] = [
        Self::Vibration,
        Self::Flashlight,
        Self::Audio,
        Self::VoiceAnnouncement,
        Self::TimeAnnouncement,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vibration => "edit vibration",
            Self::Flashlight => "edit flashlight",
            Self::Audio => "edit audio",
            Self::VoiceAnnouncement => "edit voice announcement",
            Self::TimeAnnouncement => "edit time announcement",
        }
    }

    const fn requested(self, edit: &EditSettings) -> bool {
        match self {
            Self::Vibration => edit.vibrate.is_some(),
            Self::Flashlight => edit.flashlight.is_some(),
            Self::Audio => edit.audio.is_some(),
            Self::VoiceAnnouncement => edit.voice_announcement.is_some(),
            Self::TimeAnnouncement => edit.time_announcement.is_some(),
        }
    }
}

/// Admits firing alarms and drives their channels.
pub struct Coordinator {
    registry: Arc<Registry>,
    channels: Channels,
    notifier: Arc<dyn Notifier>,
    session: Arc<dyn Session>,
    options: RingOptions,
    loop_flags: LoopFlags,
}

impl Coordinator {
    pub(crate) fn new(
        registry: Arc<Registry>,
        channels: Channels,
        notifier: Arc<dyn Notifier>,
        session: Arc<dyn Session>,
        options: RingOptions,
        loop_flags: LoopFlags,
    ) -> Self {
        Self {
            registry,
            channels,
            notifier,
            session,
            options,
            loop_flags,
        }
    }

    /// Handles a fire event.
    ///
    /// A rejected alarm has no channel engaged and no entry in the registry.
    ///
    /// # Errors
    /// [`Error::AlreadyRinging`] if an overlapping alarm fires again with an id
    /// that is still ringing.
    pub fn on_fire(&self, config: &AlarmConfiguration) -> Result<Admission, Error> {
        let id = config.id;
        {
            let _admission = self.registry.admission_lock();
            if !config.allow_overlap && self.registry.any_ringing(None) {
                info!("an alarm is already ringing, ignoring alarm {id}");
                return Ok(Admission::Rejected(RejectReason::Overlap));
            }
            self.registry.admit(id)?;
        }
        info!("alarm {id} admitted, engaging channels");

        let mut report = StepReport::new(id);
        for step in ActivationStep::ORDER {
            report.run(step.name(), || self.activate(step, config));
        }
        notify::rang(&*self.notifier, id);
        Ok(Admission::Admitted(report))
    }

    fn activate(&self, step: ActivationStep, config: &AlarmConfiguration) -> ChannelResult {
        let id = config.id;
        match step {
            ActivationStep::Volume => {
                let Some(level) = config.volume.fixed_volume else {
                    return Ok(());
                };
                let Some(volume) = present(self.channels.volume.as_ref(), "volume control") else {
                    return Ok(());
                };
                let previous = volume.current()?;
                self.registry.set_saved_volume(id, previous);
                volume.apply(level, config.volume.enforced)
            }
            ActivationStep::AudioFocus => self
                .channels
                .volume
                .as_ref()
                .map_or(Ok(()), |volume| volume.request_focus()),
            ActivationStep::CompletionListener => {
                self.loop_flags.lock().insert(id, config.audio.loop_audio);
                match self.channels.audio.as_ref() {
                    Some(audio) => audio.on_complete(self.completion_listener()),
                    None => Ok(()),
                }
            }
            ActivationStep::Flashlight => {
                if !config.flashlight {
                    return Ok(());
                }
                self.engage(id, Channel::Flashlight, |channels| {
                    channels.flashlight.as_ref().map(|torch| torch.on())
                })
            }
            ActivationStep::Audio => self.engage(id, Channel::Audio, |channels| {
                channels
                    .audio
                    .as_ref()
                    .map(|audio| audio.play(id, &config.audio))
            }),
            ActivationStep::RefreshRinging => {
                let playing = self
                    .channels
                    .audio
                    .as_ref()
                    .map(|audio| audio.currently_playing())
                    .unwrap_or_default();
                self.registry.refresh_playing(playing);
                Ok(())
            }
            ActivationStep::Vibration => {
                if !config.vibrate {
                    debug!("vibration disabled for alarm {id}");
                    return Ok(());
                }
                self.engage(id, Channel::Vibration, |channels| {
                    channels
                        .vibration
                        .as_ref()
                        .map(|vibration| vibration.start(&VibrationPattern::ALARM))
                })
            }
            ActivationStep::VoiceAnnouncement => {
                let voice = &config.voice_announcement;
                if !voice.enabled {
                    return Ok(());
                }
                let announcement = Announcement::voice(id, voice);
                self.engage(id, Channel::VoiceAnnouncement, |channels| {
                    channels.voice.as_ref().map(|voice| voice.start(&announcement))
                })
            }
            ActivationStep::TimeAnnouncement => {
                let time = &config.time_announcement;
                if !time.enabled {
                    return Ok(());
                }
                let announcement = Announcement::time(id, time, self.options.duck_level);
                self.engage(id, Channel::TimeAnnouncement, |channels| {
                    channels.time.as_ref().map(|time| time.start(&announcement))
                })
            }
            ActivationStep::Presentation => {
                if config.full_screen_presentation {
                    self.session.set_ringing_ui(true)
                } else {
                    Ok(())
                }
            }
            ActivationStep::WakeLock => self.session.acquire_wake_lock(self.options.wake_lock),
        }
    }

    /// Calls the driver picked by `start` and marks `channel` active if it
    /// worked. A missing driver is skipped.
    fn engage<F>(&self, id: AlarmId, channel: Channel, start: F) -> ChannelResult
    where
        F: FnOnce(&Channels) -> Option<ChannelResult>,
    {
        match start(&self.channels) {
            Some(result) => {
                result?;
                self.registry.mark_channel_active(id, channel);
                Ok(())
            }
            None => {
                debug!("no {channel} driver in this session, skipping it for alarm {id}");
                Ok(())
            }
        }
    }

    /// The listener ending the episode when non looping audio runs out.
    fn completion_listener(&self) -> CompletionCallback {
        let registry = Arc::clone(&self.registry);
        let loop_flags = Arc::clone(&self.loop_flags);
        let vibration = self.channels.vibration.clone();
        let volume = self.channels.volume.clone();
        Box::new(move |id| {
            // edits and stops of `id` run under the same lock
            registry.serialized(id, || {
                if loop_flags.lock().get(&id).copied().unwrap_or(true) {
                    return;
                }
                info!("audio of alarm {id} finished, releasing vibration and volume");
                let mut report = StepReport::new(id);
                if let Some(vibration) = &vibration {
                    report.run("vibration", || vibration.stop());
                }
                if let Some(volume) = &volume {
                    report.run("restore volume", || volume.restore());
                    report.run("release focus", || volume.release_focus());
                }
                registry.mark_channel_inactive(id, Channel::Vibration);
                registry.mark_channel_inactive(id, Channel::Audio);
            });
        })
    }

    /// Applies an edit to a ringing alarm, field by field.
    ///
    /// # Errors
    /// [`Error::NotRinging`] if the alarm has no ringing episode.
    pub fn on_edit(&self, edit: &EditSettings) -> Result<EditReport, Error> {
        let id = edit.id;
        if !self.registry.is_ringing(id) {
            return Err(Error::NotRinging(id));
        }
        info!("editing ringing alarm {id}");
        let mut report = StepReport::new(id);
        for step in EditStep::ORDER {
            if step.requested(edit) {
                report.run(step.name(), || self.apply_edit(step, edit));
            }
        }
        Ok(report)
    }

    fn apply_edit(&self, step: EditStep, edit: &EditSettings) -> ChannelResult {
        let id = edit.id;
        match step {
            EditStep::Vibration => {
                let Some(vibration) = present(self.channels.vibration.as_ref(), "vibrator") else {
                    return Ok(());
                };
                if edit.vibrate == Some(true) {
                    vibration.start(&VibrationPattern::ALARM)?;
                    self.registry.mark_channel_active(id, Channel::Vibration);
                } else {
                    vibration.stop()?;
                    self.registry.mark_channel_inactive(id, Channel::Vibration);
                }
                Ok(())
            }
            EditStep::Flashlight => {
                let Some(torch) = present(self.channels.flashlight.as_ref(), "flashlight") else {
                    return Ok(());
                };
                if edit.flashlight == Some(true) {
                    torch.on()?;
                    self.registry.mark_channel_active(id, Channel::Flashlight);
                } else {
                    torch.off()?;
                    self.registry.mark_channel_inactive(id, Channel::Flashlight);
                }
                Ok(())
            }
            EditStep::Audio => {
                let (Some(settings), Some(audio)) = (
                    edit.audio.as_ref(),
                    present(self.channels.audio.as_ref(), "audio output"),
                ) else {
                    return Ok(());
                };
                audio.stop(id)?;
                self.registry.mark_channel_inactive(id, Channel::Audio);
                self.loop_flags.lock().insert(id, settings.loop_audio);
                audio.play(id, settings)?;
                self.registry.mark_channel_active(id, Channel::Audio);
                self.registry.refresh_playing(audio.currently_playing());
                Ok(())
            }
            EditStep::VoiceAnnouncement => match edit.voice_announcement.as_ref() {
                Some(voice) => self.replace_announcement(
                    id,
                    Channel::VoiceAnnouncement,
                    voice.enabled.then(|| Announcement::voice(id, voice)),
                ),
                None => Ok(()),
            },
            EditStep::TimeAnnouncement => match edit.time_announcement.as_ref() {
                Some(time) => self.replace_announcement(
                    id,
                    Channel::TimeAnnouncement,
                    time.enabled
                        .then(|| Announcement::time(id, time, self.options.duck_level)),
                ),
                None => Ok(()),
            },
        }
    }

    /// Stops whatever the announcer says and starts `next`, if any.
    fn replace_announcement(
        &self,
        id: AlarmId,
        channel: Channel,
        next: Option<Announcement>,
    ) -> ChannelResult {
        let Some(announcer) = present(self.channels.announcer(channel), "speech output") else {
            return Ok(());
        };
        announcer.stop()?;
        self.registry.mark_channel_inactive(id, channel);
        if let Some(announcement) = next {
            announcer.start(&announcement)?;
            self.registry.mark_channel_active(id, channel);
        }
        Ok(())
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("channels", &self.channels)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn present<'a, T: ?Sized>(driver: Option<&'a Arc<T>>, what: &str) -> Option<&'a Arc<T>> {
    if driver.is_none() {
        debug!("no {what} in this session");
    }
    driver
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use test_case::test_case;

    use super::*;
    use crate::{
        alarm::{AudioSettings, VoiceAnnouncementSettings},
        testing::{CallLog, Rig},
    };

    fn admitted(admission: Admission) -> ActivationReport {
        match admission {
            Admission::Admitted(report) => report,
            Admission::Rejected(reason) => panic!("alarm was rejected: {reason:?}"),
        }
    }

    #[test]
    fn channels_come_up_in_order() {
        let rig = Rig::new();
        let report = admitted(rig.service.on_fire(&Rig::loud_alarm(1)).unwrap());
        assert!(report.is_clean());
        assert_eq!(
            rig.log.calls(),
            [
                "volume.current",
                "volume.apply",
                "volume.request_focus",
                "audio.on_complete",
                "flashlight.on",
                "audio.play",
                "vibration.start",
                "voice.start",
                "time.start",
                "session.ringing_ui_on",
                "session.wake_lock",
                "notify.rang",
            ]
        );
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert_eq!(
            entry.active_channels,
            [
                Channel::Audio,
                Channel::Vibration,
                Channel::Flashlight,
                Channel::VoiceAnnouncement,
                Channel::TimeAnnouncement,
            ]
            .into_iter()
            .collect::<BTreeSet<_>>()
        );
        assert_eq!(entry.saved_system_volume, Some(0.3));
    }

    #[test]
    fn plain_alarm_only_engages_what_it_asks_for() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        assert_eq!(rig.log.count("volume.apply"), 0);
        assert_eq!(rig.log.count("flashlight.on"), 0);
        assert_eq!(rig.log.count("voice.start"), 0);
        assert_eq!(rig.log.count("session.ringing_ui_on"), 0);
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert!(entry.is_active(Channel::Audio));
        assert!(entry.is_active(Channel::Vibration));
        assert_eq!(entry.saved_system_volume, None);
    }

    #[test]
    fn time_announcement_ducks_to_the_configured_level() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::loud_alarm(1)).unwrap());
        let said = rig.time.last().unwrap();
        assert_eq!(said.duck_audio, Some(0.1));
        assert_eq!(rig.voice.last().unwrap().duck_audio, None);
    }

    #[test]
    fn overlapping_fire_engages_nothing() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        rig.log.clear();

        let admission = rig.service.on_fire(&Rig::loud_alarm(2)).unwrap();
        assert!(matches!(admission, Admission::Rejected(RejectReason::Overlap)));
        assert!(!rig.service.is_ringing(AlarmId(2)));
        for engage in [
            "audio.play",
            "vibration.start",
            "flashlight.on",
            "volume.apply",
            "voice.start",
            "time.start",
            "notify.rang",
        ] {
            assert_eq!(rig.log.count(engage), 0, "{engage} was called");
        }
    }

    #[test]
    fn foreign_playback_also_blocks_admission() {
        let rig = Rig::new();
        rig.audio.start_foreign(AlarmId(9));
        // the driver's report is only read while alarms start and stop
        admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        rig.service.force_stop(AlarmId(1));

        assert!(rig.service.snapshot().is_empty());
        assert_eq!(rig.service.registry().global_ringing(), [AlarmId(9)]);
        assert!(!rig.service.on_fire(&Rig::alarm(3)).unwrap().is_admitted());
    }

    #[test]
    fn overlapping_refire_of_a_ringing_id_is_an_error() {
        let rig = Rig::new();
        let mut config = Rig::alarm(4);
        config.allow_overlap = true;
        admitted(rig.service.on_fire(&config).unwrap());
        assert!(matches!(
            rig.service.on_fire(&config),
            Err(Error::AlreadyRinging(AlarmId(4)))
        ));
        assert_eq!(rig.log.count("audio.play"), 1);
    }

    #[test_case("flashlight.on", "flashlight", Channel::Flashlight ; "flashlight")]
    #[test_case("audio.play", "audio", Channel::Audio ; "audio")]
    #[test_case("voice.start", "voice announcement", Channel::VoiceAnnouncement ; "voice")]
    fn failing_step_leaves_the_rest_running(call: &str, step: &str, channel: Channel) {
        let log = CallLog::default();
        log.fail(call);
        let rig = Rig::with_log(log);
        let report = admitted(rig.service.on_fire(&Rig::loud_alarm(1)).unwrap());

        assert!(report.failed(step));
        assert_eq!(report.failures().len(), 1);
        assert!(report.completed().contains(&"wake lock"));
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert!(!entry.is_active(channel));
        assert!(entry.is_active(Channel::Vibration));
        assert_eq!(rig.log.count("notify.rang"), 1);
    }

    #[test]
    fn panicking_driver_is_contained() {
        let log = CallLog::default();
        log.panic_on("audio.play");
        let rig = Rig::with_log(log);
        let report = admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        assert!(report.failed("audio"));
        assert!(rig.vibration.is_running());
    }

    #[test]
    fn failing_volume_read_skips_the_override() {
        let log = CallLog::default();
        log.fail("volume.current");
        let rig = Rig::with_log(log);
        let report = admitted(rig.service.on_fire(&Rig::loud_alarm(1)).unwrap());
        assert!(report.failed("volume"));
        assert_eq!(rig.log.count("volume.apply"), 0);
        assert!((rig.volume.level() - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn edit_only_touches_named_channels() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        rig.log.clear();

        let report = rig
            .service
            .on_edit(&EditSettings::new(AlarmId(1)).vibrate(false))
            .unwrap();
        assert_eq!(report.completed(), &["edit vibration"]);
        assert_eq!(rig.log.calls(), ["vibration.stop"]);
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert!(!entry.is_active(Channel::Vibration));
        assert!(entry.is_active(Channel::Audio));
    }

    #[test]
    fn edit_swaps_audio_and_announcements() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::loud_alarm(1)).unwrap());
        rig.log.clear();

        let mut sound = AudioSettings::new("rooster.mp3");
        sound.loop_audio = false;
        let edit = EditSettings::new(AlarmId(1))
            .flashlight(false)
            .audio(sound)
            .voice_announcement(VoiceAnnouncementSettings::default());
        let report = rig.service.on_edit(&edit).unwrap();

        assert!(report.is_clean());
        assert_eq!(
            rig.log.calls(),
            ["flashlight.off", "audio.stop", "audio.play", "voice.stop"]
        );
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert!(!entry.is_active(Channel::Flashlight));
        assert!(!entry.is_active(Channel::VoiceAnnouncement));
        assert!(entry.is_active(Channel::Audio));
        assert!(entry.is_active(Channel::TimeAnnouncement));
        assert!(!rig.flashlight.is_lit());
    }

    #[test]
    fn editing_a_silent_alarm_fails() {
        let rig = Rig::new();
        assert!(matches!(
            rig.service.on_edit(&EditSettings::new(AlarmId(5)).vibrate(true)),
            Err(Error::NotRinging(AlarmId(5)))
        ));
        assert!(rig.log.calls().is_empty());
    }

    #[test]
    fn finished_audio_releases_vibration_and_volume_once() {
        let rig = Rig::new();
        let mut config = Rig::loud_alarm(1);
        config.audio.loop_audio = false;
        admitted(rig.service.on_fire(&config).unwrap());

        rig.audio.complete(AlarmId(1));
        assert_eq!(rig.log.count("vibration.stop"), 1);
        assert_eq!(rig.log.count("volume.restore"), 1);
        assert_eq!(rig.log.count("volume.release_focus"), 1);
        assert!((rig.volume.level() - 0.3).abs() < f32::EPSILON);
        let entry = rig.service.entry(AlarmId(1)).unwrap();
        assert!(!entry.is_active(Channel::Audio));
        assert!(!entry.is_active(Channel::Vibration));
        // the alarm itself keeps ringing until it is stopped
        assert!(rig.service.is_ringing(AlarmId(1)));
    }

    #[test]
    fn looping_audio_completion_is_ignored() {
        let rig = Rig::new();
        admitted(rig.service.on_fire(&Rig::alarm(1)).unwrap());
        rig.audio.complete(AlarmId(1));
        assert_eq!(rig.log.count("vibration.stop"), 0);
        assert_eq!(rig.log.count("volume.restore"), 0);
    }

    #[test]
    fn completion_waits_for_the_alarm_lock() {
        let rig = Rig::new();
        let mut config = Rig::alarm(1);
        config.audio.loop_audio = false;
        admitted(rig.service.on_fire(&config).unwrap());

        let lock = rig.service.registry().id_lock(AlarmId(1));
        let held = lock.lock();
        std::thread::scope(|scope| {
            let done = scope.spawn(|| rig.audio.complete(AlarmId(1)));
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert_eq!(rig.log.count("vibration.stop"), 0);
            drop(held);
            done.join().unwrap();
        });
        assert_eq!(rig.log.count("vibration.stop"), 1);
        assert!(!rig
            .service
            .entry(AlarmId(1))
            .unwrap()
            .is_active(Channel::Vibration));
    }
}
