//! # Teardown sequencer
//!
//! Releases everything a ringing alarm holds, in a fixed order. Every step
//! runs even if the ones before it failed: a leaked torch or a stuck volume
//! override is worse than a redundant driver call.
//!
//! ```text
//! Notify → RingingUi → RefreshRinging → RestoreVolume → ReleaseFocus
//!        → Audio → Announcements → Vibration → Shutdown → Flashlight
//!        → Foreground → Registry
//! ```

use std::{fmt, sync::Arc};

use log::{debug, info};

use crate::{
    alarm::AlarmId,
    channel::{Channel, ChannelResult, Channels},
    coordinator::LoopFlags,
    notify::{self, Notifier},
    registry::{Registry, RingingAlarmEntry},
    session::Session,
    step::{StepReport, TeardownReport},
};

/// Why an alarm is being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The user or the host asked for it.
    Explicit,
    /// The alarm fired while another one was ringing and may not overlap.
    OverlapRejected,
    /// The session is going away, the host is not told.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    Notify,
    RingingUi,
    RefreshRinging,
    RestoreVolume,
    ReleaseFocus,
    Audio,
    Announcements,
    Vibration,
    Shutdown,
    Flashlight,
    Foreground,
    Registry,
}

impl TeardownStep {
    pub const ORDER: [Self; 12] = [
        Self::Notify,
        Self::RingingUi,
        Self::RefreshRinging,
        Self::RestoreVolume,
        Self::ReleaseFocus,
        Self::Audio,
        Self::Announcements,
        Self::Vibration,
        Self::Shutdown,
        Self::Flashlight,
        Self::Foreground,
        Self::Registry,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Notify => "notify stopped",
            Self::RingingUi => "ringing ui",
            Self::RefreshRinging => "refresh ringing",
            Self::RestoreVolume => "restore volume",
            Self::ReleaseFocus => "release focus",
            Self::Audio => "stop audio",
            Self::Announcements => "stop announcements",
            Self::Vibration => "stop vibration",
            Self::Shutdown => "shutdown",
            Self::Flashlight => "flashlight off",
            Self::Foreground => "release foreground",
            Self::Registry => "registry",
        }
    }
}

/// Session wide release, used when the host destroys the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceStep {
    ClearRegistry,
    ReleaseAudio,
    StopVibration,
    RestoreVolume,
    ReleaseFocus,
    StopVoice,
    StopTime,
    Flashlight,
    RingingUi,
    Foreground,
}

impl ForceStep {
    pub const ORDER: [Self; 10] = [
        Self::ClearRegistry,
        Self::ReleaseAudio,
        Self::StopVibration,
        Self::RestoreVolume,
        Self::ReleaseFocus,
        Self::StopVoice,
        Self::StopTime,
        Self::Flashlight,
        Self::RingingUi,
        Self::Foreground,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ClearRegistry => "clear registry",
            Self::ReleaseAudio => "release audio",
            Self::StopVibration => "stop vibration",
            Self::RestoreVolume => "restore volume",
            Self::ReleaseFocus => "release focus",
            Self::StopVoice => "stop voice announcement",
            Self::StopTime => "stop time announcement",
            Self::Flashlight => "flashlight off",
            Self::RingingUi => "ringing ui",
            Self::Foreground => "release foreground",
        }
    }
}

/// State carried between the steps of one stop.
struct Pass {
    id: AlarmId,
    reason: StopReason,
    entry: Option<RingingAlarmEntry>,
    /// `id` never rang while another alarm does, so the shared screen,
    /// torch and foreground belong to that alarm
    bystander: bool,
    /// no playback left anywhere once this alarm's audio stopped
    idle: bool,
}

pub struct TeardownSequencer {
    registry: Arc<Registry>,
    channels: Channels,
    notifier: Arc<dyn Notifier>,
    session: Arc<dyn Session>,
    loop_flags: LoopFlags,
}

impl TeardownSequencer {
    pub(crate) fn new(
        registry: Arc<Registry>,
        channels: Channels,
        notifier: Arc<dyn Notifier>,
        session: Arc<dyn Session>,
        loop_flags: LoopFlags,
    ) -> Self {
        Self {
            registry,
            channels,
            notifier,
            session,
            loop_flags,
        }
    }

    /// Stops alarm `id`. Safe to call for an id that is not ringing.
    pub fn stop(&self, id: AlarmId, reason: StopReason) -> TeardownReport {
        info!("stopping alarm {id} ({reason:?})");
        let entry = self.registry.entry(id);
        let bystander = entry.is_none() && self.registry.snapshot().iter().any(|o| *o != id);
        let mut pass = Pass {
            id,
            reason,
            entry,
            bystander,
            idle: false,
        };
        let mut report = StepReport::new(id);
        for step in TeardownStep::ORDER {
            report.run(step.name(), || self.step(step, &mut pass));
        }
        report
    }

    fn step(&self, step: TeardownStep, pass: &mut Pass) -> ChannelResult {
        let id = pass.id;
        match step {
            TeardownStep::Notify => {
                let tell_host = match pass.reason {
                    StopReason::Explicit => pass.entry.is_some(),
                    StopReason::OverlapRejected => true,
                    StopReason::Forced => false,
                };
                if tell_host {
                    notify::stopped(&*self.notifier, id);
                }
                Ok(())
            }
            TeardownStep::RingingUi if pass.bystander => Ok(()),
            TeardownStep::RingingUi => self.session.set_ringing_ui(false),
            TeardownStep::RefreshRinging => {
                let playing = self
                    .channels
                    .audio
                    .as_ref()
                    .map(|audio| audio.currently_playing())
                    .unwrap_or_default();
                self.registry.refresh_playing(playing);
                Ok(())
            }
            TeardownStep::RestoreVolume => {
                let saved = pass.entry.as_ref().and_then(|e| e.saved_system_volume);
                match (saved, self.channels.volume.as_ref()) {
                    (Some(level), Some(volume)) => {
                        debug!("restoring volume saved by alarm {id} ({level})");
                        volume.restore()
                    }
                    _ => Ok(()),
                }
            }
            TeardownStep::ReleaseFocus => match (&pass.entry, self.channels.volume.as_ref()) {
                (Some(_), Some(volume)) => volume.release_focus(),
                _ => Ok(()),
            },
            TeardownStep::Audio => match self.channels.audio.as_ref() {
                Some(audio) => audio.stop(id),
                None => Ok(()),
            },
            TeardownStep::Announcements => {
                let Some(entry) = &pass.entry else {
                    return Ok(());
                };
                let mut first_error = None;
                for channel in [Channel::VoiceAnnouncement, Channel::TimeAnnouncement] {
                    if !entry.is_active(channel) {
                        continue;
                    }
                    if let Some(announcer) = self.channels.announcer(channel) {
                        if let Err(e) = announcer.stop() {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            TeardownStep::Vibration => {
                pass.idle = self.channels.audio.as_ref().map_or_else(
                    || self.registry.snapshot().iter().all(|other| *other == id),
                    |audio| audio.is_empty(),
                );
                match (pass.idle, self.channels.vibration.as_ref()) {
                    (true, Some(vibration)) => vibration.stop(),
                    _ => Ok(()),
                }
            }
            TeardownStep::Shutdown => {
                if pass.idle {
                    info!("no alarm left ringing, ending session");
                    self.session.shutdown()
                } else {
                    Ok(())
                }
            }
            TeardownStep::Flashlight | TeardownStep::Foreground if pass.bystander => Ok(()),
            TeardownStep::Flashlight => match self.channels.flashlight.as_ref() {
                Some(torch) => {
                    torch.off()?;
                    self.registry
                        .mark_channel_inactive_everywhere(Channel::Flashlight);
                    Ok(())
                }
                None => Ok(()),
            },
            TeardownStep::Foreground => self.session.release_foreground(),
            TeardownStep::Registry => {
                self.loop_flags.lock().remove(&id);
                match self.registry.remove(id) {
                    Ok(entry) => debug!("alarm {id} released {:?}", entry.active_channels),
                    Err(e) => debug!("nothing to remove: {e}"),
                }
                Ok(())
            }
        }
    }

    /// Releases every channel and forgets every ringing alarm, whatever state
    /// they are in. Each driver is called exactly once.
    pub fn force_teardown_all(&self) -> TeardownReport {
        info!("tearing down every alarm");
        let mut report = StepReport::global();
        for step in ForceStep::ORDER {
            report.run(step.name(), || self.force_step(step));
        }
        report
    }

    fn force_step(&self, step: ForceStep) -> ChannelResult {
        let channels = &self.channels;
        match step {
            ForceStep::ClearRegistry => {
                let cleared = self.registry.clear();
                self.loop_flags.lock().clear();
                debug!("forgot {} ringing alarm(s)", cleared.len());
                Ok(())
            }
            ForceStep::ReleaseAudio => channels.audio.as_ref().map_or(Ok(()), |a| a.release_all()),
            ForceStep::StopVibration => channels.vibration.as_ref().map_or(Ok(()), |v| v.stop()),
            ForceStep::RestoreVolume => channels.volume.as_ref().map_or(Ok(()), |v| v.restore()),
            ForceStep::ReleaseFocus => channels
                .volume
                .as_ref()
                .map_or(Ok(()), |v| v.release_focus()),
            ForceStep::StopVoice => channels.voice.as_ref().map_or(Ok(()), |a| a.stop()),
            ForceStep::StopTime => channels.time.as_ref().map_or(Ok(()), |a| a.stop()),
            ForceStep::Flashlight => channels.flashlight.as_ref().map_or(Ok(()), |t| t.off()),
            ForceStep::RingingUi => self.session.set_ringing_ui(false),
            ForceStep::Foreground => self.session.release_foreground(),
        }
    }
}

impl fmt::Debug for TeardownSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeardownSequencer")
            .field("registry", &self.registry)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}
