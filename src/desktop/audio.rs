use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::BufReader,
    sync::{Arc, Weak},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info};
use parking_lot::Mutex;
use rodio::{mixer::Mixer, Decoder, Sink, Source};

use super::volume::SoftwareVolume;
use crate::{
    alarm::{AlarmId, AudioSettings, FadeStep},
    channel::{AudioChannel, ChannelResult, CompletionCallback},
    error::ChannelError,
};

/// How often sinks are checked for completion and their volume refreshed.
const POLL: Duration = Duration::from_millis(50);

type Listener = Arc<dyn Fn(AlarmId) + Send + Sync>;

struct Playback {
    sink: Sink,
    /// level of this alarm alone, before master volume and ducking
    level: f32,
    looping: bool,
    started: Instant,
    fade_steps: Vec<FadeStep>,
}

impl Playback {
    fn volume(&self, master: f32, duck: Option<f32>) -> f32 {
        let fade = fade_level(&self.fade_steps, self.started.elapsed());
        master * self.level * fade * duck.unwrap_or(1.0)
    }
}

struct Shared {
    mixer: Mixer,
    master: SoftwareVolume,
    playbacks: Mutex<HashMap<AlarmId, Playback>>,
    duck: Mutex<Option<f32>>,
    listener: Mutex<Option<Listener>>,
}

impl Shared {
    fn refresh_volumes(&self) {
        let master = self.master.level();
        let duck = *self.duck.lock();
        for playback in self.playbacks.lock().values() {
            playback.sink.set_volume(playback.volume(master, duck));
        }
    }

    /// Drops non looping playbacks that ran out, returning their ids.
    fn reap_finished(&self) -> Vec<AlarmId> {
        let mut playbacks = self.playbacks.lock();
        let finished: Vec<_> = playbacks
            .iter()
            .filter(|(_, playback)| !playback.looping && playback.sink.empty())
            .map(|(id, _)| *id)
            .collect();
        for id in &finished {
            playbacks.remove(id);
        }
        finished
    }
}

/// Plays alarm sounds through a rodio mixer, one sink per alarm.
pub struct RodioAudio {
    shared: Arc<Shared>,
}

impl RodioAudio {
    /// Starts the watcher thread, it ends when the driver is dropped.
    #[must_use]
    pub fn new(mixer: Mixer, master: SoftwareVolume) -> Self {
        let shared = Arc::new(Shared {
            mixer,
            master,
            playbacks: Mutex::new(HashMap::new()),
            duck: Mutex::new(None),
            listener: Mutex::new(None),
        });
        let weak = Arc::downgrade(&shared);
        thread::spawn(move || watch(&weak));
        Self { shared }
    }

    fn open(settings: &AudioSettings) -> Result<Decoder<BufReader<File>>, ChannelError> {
        let file = File::open(&settings.path)?;
        Decoder::new(BufReader::new(file))
            .map_err(|e| ChannelError::Driver(format!("{}: {e}", settings.path.display())))
    }
}

fn watch(shared: &Weak<Shared>) {
    debug!("audio watcher started");
    loop {
        thread::sleep(POLL);
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.refresh_volumes();
        let finished = shared.reap_finished();
        if finished.is_empty() {
            continue;
        }
        let listener = shared.listener.lock().clone();
        for id in finished {
            info!("audio of alarm {id} played to the end");
            if let Some(listener) = &listener {
                listener(id);
            }
        }
    }
    debug!("audio watcher stopped");
}

/// Volume factor of a fade ramp at `elapsed`, interpolating linearly
/// between steps. No steps means full volume.
#[must_use]
pub fn fade_level(steps: &[FadeStep], elapsed: Duration) -> f32 {
    let (Some(first), Some(last)) = (steps.first(), steps.last()) else {
        return 1.0;
    };
    if elapsed <= first.time() {
        return first.volume;
    }
    for pair in steps.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        if elapsed <= to.time() {
            let span = to.time().saturating_sub(from.time()).as_secs_f32();
            if span == 0.0 {
                return to.volume;
            }
            let progress = elapsed.saturating_sub(from.time()).as_secs_f32() / span;
            return (to.volume - from.volume).mul_add(progress, from.volume);
        }
    }
    last.volume
}

impl AudioChannel for RodioAudio {
    fn play(&self, id: AlarmId, settings: &AudioSettings) -> ChannelResult {
        let source = Self::open(settings)?;
        let sink = Sink::connect_new(&self.shared.mixer);
        let fade = settings.fade_duration();
        match (settings.loop_audio, fade.is_zero()) {
            (true, true) => sink.append(source.repeat_infinite()),
            (true, false) => sink.append(source.repeat_infinite().fade_in(fade)),
            (false, true) => sink.append(source),
            (false, false) => sink.append(source.fade_in(fade)),
        }
        let playback = Playback {
            sink,
            level: settings.volume.unwrap_or(1.0).clamp(0.0, 1.0),
            looping: settings.loop_audio,
            started: Instant::now(),
            fade_steps: settings.fade_steps.clone(),
        };
        playback
            .sink
            .set_volume(playback.volume(self.shared.master.level(), *self.shared.duck.lock()));
        playback.sink.play();
        info!("playing {} for alarm {id}", settings.path.display());
        if let Some(previous) = self.shared.playbacks.lock().insert(id, playback) {
            debug!("alarm {id} was already playing, replaced its sink");
            previous.sink.stop();
        }
        Ok(())
    }

    fn stop(&self, id: AlarmId) -> ChannelResult {
        match self.shared.playbacks.lock().remove(&id) {
            Some(playback) => {
                playback.sink.stop();
                info!("audio of alarm {id} stopped");
            }
            None => debug!("no audio playing for alarm {id}"),
        }
        Ok(())
    }

    fn currently_playing(&self) -> Vec<AlarmId> {
        let mut ids: Vec<_> = self.shared.playbacks.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn is_empty(&self) -> bool {
        self.shared.playbacks.lock().is_empty()
    }

    fn on_complete(&self, callback: CompletionCallback) -> ChannelResult {
        *self.shared.listener.lock() = Some(Arc::from(callback));
        Ok(())
    }

    fn duck(&self, level: f32) -> ChannelResult {
        *self.shared.duck.lock() = Some(level.clamp(0.0, 1.0));
        self.shared.refresh_volumes();
        debug!("audio ducked to {level}");
        Ok(())
    }

    fn unduck(&self) -> ChannelResult {
        *self.shared.duck.lock() = None;
        self.shared.refresh_volumes();
        debug!("audio unducked");
        Ok(())
    }

    fn release_all(&self) -> ChannelResult {
        let drained: Vec<_> = self.shared.playbacks.lock().drain().collect();
        for (id, playback) in drained {
            playback.sink.stop();
            debug!("released audio of alarm {id}");
        }
        *self.shared.duck.lock() = None;
        *self.shared.listener.lock() = None;
        Ok(())
    }
}

impl fmt::Debug for RodioAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RodioAudio")
            .field("playing", &self.currently_playing())
            .field("duck", &*self.shared.duck.lock())
            .finish_non_exhaustive()
    }
}
