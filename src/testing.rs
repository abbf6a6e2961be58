//! Recording fake drivers for unit tests.
//!
//! Every fake writes its calls as `driver.call` strings into one shared
//! [`CallLog`], so tests can assert on counts and on the order across drivers.
//! Failures and panics can be injected per call name.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{
    alarm::{AlarmConfiguration, AlarmId, AudioSettings},
    channel::{
        Announcement, Announcer, AudioChannel, ChannelResult, Channels, CompletionCallback,
        FlashlightChannel, VibrationChannel, VibrationPattern, VolumeChannel,
    },
    communication::HostEvent,
    coordinator::RingOptions,
    error::{ChannelError, NotifyError},
    notify::Notifier,
    service::AlarmService,
    session::Session,
};

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    panicking: Arc<Mutex<HashSet<String>>>,
}

impl CallLog {
    /// Records `call` and returns the injected outcome for it.
    pub fn record(&self, call: &str) -> ChannelResult {
        self.calls.lock().push(call.to_string());
        let panics = self.panicking.lock().contains(call);
        assert!(!panics, "{call} blew up");
        if self.failing.lock().contains(call) {
            return Err(ChannelError::Driver(format!("{call} failed")));
        }
        Ok(())
    }

    pub fn fail(&self, call: &str) {
        self.failing.lock().insert(call.to_string());
    }

    pub fn panic_on(&self, call: &str) {
        self.panicking.lock().insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

type Listener = Arc<dyn Fn(AlarmId) + Send + Sync>;

pub struct FakeAudio {
    log: CallLog,
    playing: Mutex<Vec<AlarmId>>,
    listener: Mutex<Option<Listener>>,
}

impl FakeAudio {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            playing: Mutex::new(vec![]),
            listener: Mutex::new(None),
        }
    }

    /// Playback of `id` ran out on its own.
    pub fn complete(&self, id: AlarmId) {
        self.playing.lock().retain(|other| *other != id);
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(id);
        }
    }

    /// Something outside the registry plays `id`.
    pub fn start_foreign(&self, id: AlarmId) {
        self.playing.lock().push(id);
    }
}

impl AudioChannel for FakeAudio {
    fn play(&self, id: AlarmId, _settings: &AudioSettings) -> ChannelResult {
        self.log.record("audio.play")?;
        let mut playing = self.playing.lock();
        if !playing.contains(&id) {
            playing.push(id);
        }
        Ok(())
    }

    fn stop(&self, id: AlarmId) -> ChannelResult {
        self.log.record("audio.stop")?;
        self.playing.lock().retain(|other| *other != id);
        Ok(())
    }

    fn currently_playing(&self) -> Vec<AlarmId> {
        self.playing.lock().clone()
    }

    fn on_complete(&self, callback: CompletionCallback) -> ChannelResult {
        self.log.record("audio.on_complete")?;
        *self.listener.lock() = Some(Arc::from(callback));
        Ok(())
    }

    fn duck(&self, _level: f32) -> ChannelResult {
        self.log.record("audio.duck")
    }

    fn unduck(&self) -> ChannelResult {
        self.log.record("audio.unduck")
    }

    fn release_all(&self) -> ChannelResult {
        self.log.record("audio.release_all")?;
        self.playing.lock().clear();
        *self.listener.lock() = None;
        Ok(())
    }
}

pub struct FakeVibration {
    log: CallLog,
    running: AtomicBool,
}

impl FakeVibration {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl VibrationChannel for FakeVibration {
    fn start(&self, _pattern: &VibrationPattern) -> ChannelResult {
        self.log.record("vibration.start")?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> ChannelResult {
        self.log.record("vibration.stop")?;
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeVolume {
    log: CallLog,
    level: Mutex<f32>,
    saved: Mutex<Option<f32>>,
}

impl FakeVolume {
    pub fn new(log: &CallLog, level: f32) -> Self {
        Self {
            log: log.clone(),
            level: Mutex::new(level),
            saved: Mutex::new(None),
        }
    }

    pub fn level(&self) -> f32 {
        *self.level.lock()
    }
}

impl VolumeChannel for FakeVolume {
    fn current(&self) -> Result<f32, ChannelError> {
        self.log.record("volume.current")?;
        Ok(self.level())
    }

    fn apply(&self, level: f32, _enforced: bool) -> ChannelResult {
        self.log.record("volume.apply")?;
        *self.saved.lock() = Some(self.level());
        *self.level.lock() = level;
        Ok(())
    }

    fn restore(&self) -> ChannelResult {
        self.log.record("volume.restore")?;
        if let Some(saved) = self.saved.lock().take() {
            *self.level.lock() = saved;
        }
        Ok(())
    }

    fn request_focus(&self) -> ChannelResult {
        self.log.record("volume.request_focus")
    }

    fn release_focus(&self) -> ChannelResult {
        self.log.record("volume.release_focus")
    }
}

pub struct FakeFlashlight {
    log: CallLog,
    lit: AtomicBool,
}

impl FakeFlashlight {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            lit: AtomicBool::new(false),
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::SeqCst)
    }
}

impl FlashlightChannel for FakeFlashlight {
    fn on(&self) -> ChannelResult {
        self.log.record("flashlight.on")?;
        self.lit.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn off(&self) -> ChannelResult {
        self.log.record("flashlight.off")?;
        self.lit.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeAnnouncer {
    log: CallLog,
    name: &'static str,
    said: Mutex<Vec<Announcement>>,
}

impl FakeAnnouncer {
    pub fn new(log: &CallLog, name: &'static str) -> Self {
        Self {
            log: log.clone(),
            name,
            said: Mutex::new(vec![]),
        }
    }

    pub fn last(&self) -> Option<Announcement> {
        self.said.lock().last().cloned()
    }
}

impl Announcer for FakeAnnouncer {
    fn start(&self, announcement: &Announcement) -> ChannelResult {
        self.log.record(&format!("{}.start", self.name))?;
        self.said.lock().push(announcement.clone());
        Ok(())
    }

    fn stop(&self) -> ChannelResult {
        self.log.record(&format!("{}.stop", self.name))
    }
}

pub struct FakeSession {
    log: CallLog,
}

impl FakeSession {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }
}

impl Session for FakeSession {
    fn set_ringing_ui(&self, ringing: bool) -> ChannelResult {
        self.log.record(if ringing {
            "session.ringing_ui_on"
        } else {
            "session.ringing_ui_off"
        })
    }

    fn acquire_wake_lock(&self, _timeout: Duration) -> ChannelResult {
        self.log.record("session.wake_lock")
    }

    fn release_foreground(&self) -> ChannelResult {
        self.log.record("session.foreground")
    }

    fn shutdown(&self) -> ChannelResult {
        self.log.record("session.shutdown")
    }
}

pub struct FakeNotifier {
    log: CallLog,
    events: Mutex<Vec<HostEvent>>,
}

impl FakeNotifier {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            events: Mutex::new(vec![]),
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    fn deliver(&self, call: &str, event: HostEvent) -> Result<(), NotifyError> {
        self.log
            .record(call)
            .map_err(|e| NotifyError::Rejected(e.to_string()))?;
        self.events.lock().push(event);
        Ok(())
    }
}

impl Notifier for FakeNotifier {
    fn alarm_rang(&self, id: AlarmId) -> Result<(), NotifyError> {
        self.deliver("notify.rang", HostEvent::AlarmRang(id))
    }

    fn alarm_stopped(&self, id: AlarmId) -> Result<(), NotifyError> {
        self.deliver("notify.stopped", HostEvent::AlarmStopped(id))
    }
}

/// A service wired to a full set of fakes.
pub struct Rig {
    pub log: CallLog,
    pub audio: Arc<FakeAudio>,
    pub vibration: Arc<FakeVibration>,
    pub volume: Arc<FakeVolume>,
    pub flashlight: Arc<FakeFlashlight>,
    pub voice: Arc<FakeAnnouncer>,
    pub time: Arc<FakeAnnouncer>,
    pub notifier: Arc<FakeNotifier>,
    pub service: AlarmService,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_log(CallLog::default())
    }

    /// Rig whose log already has failures or panics injected.
    pub fn with_log(log: CallLog) -> Self {
        let audio = Arc::new(FakeAudio::new(&log));
        let vibration = Arc::new(FakeVibration::new(&log));
        let volume = Arc::new(FakeVolume::new(&log, 0.3));
        let flashlight = Arc::new(FakeFlashlight::new(&log));
        let voice = Arc::new(FakeAnnouncer::new(&log, "voice"));
        let time = Arc::new(FakeAnnouncer::new(&log, "time"));
        let notifier = Arc::new(FakeNotifier::new(&log));
        let channels = Channels::new()
            .with_audio(audio.clone())
            .with_vibration(vibration.clone())
            .with_volume(volume.clone())
            .with_flashlight(flashlight.clone())
            .with_voice(voice.clone())
            .with_time(time.clone());
        let service = AlarmService::new(
            channels,
            notifier.clone(),
            Arc::new(FakeSession::new(&log)),
            RingOptions::default(),
        );
        Self {
            log,
            audio,
            vibration,
            volume,
            flashlight,
            voice,
            time,
            notifier,
            service,
        }
    }

    /// A plain looping alarm: audio and vibration, nothing else.
    pub fn alarm(id: i64) -> AlarmConfiguration {
        AlarmConfiguration::new(id, AudioSettings::new("beep_beep.mp3"))
    }

    /// An alarm that uses every channel and overrides the volume.
    pub fn loud_alarm(id: i64) -> AlarmConfiguration {
        let mut config = Self::alarm(id);
        config.volume.fixed_volume = Some(0.9);
        config.flashlight = true;
        config.voice_announcement.enabled = true;
        config.voice_announcement.text = "rise and shine".to_string();
        config.time_announcement.enabled = true;
        config.full_screen_presentation = true;
        config
    }
}
