use std::{sync::Arc, thread, time::Duration};

use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    channel::{ChannelResult, VolumeChannel},
    error::ChannelError,
};

#[derive(Debug)]
struct State {
    level: f32,
    /// level found before the last override, last writer wins
    saved: Option<f32>,
    /// level an enforced override keeps putting back
    enforced: Option<f32>,
    enforcer_running: bool,
    focused: bool,
}

/// Master volume of the process, applied by the audio driver to every sink.
#[derive(Debug, Clone)]
pub struct SoftwareVolume {
    state: Arc<Mutex<State>>,
    enforce_interval: Duration,
}

impl SoftwareVolume {
    #[must_use]
    pub fn new(level: f32, enforce_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                level: level.clamp(0.0, 1.0),
                saved: None,
                enforced: None,
                enforcer_running: false,
                focused: false,
            })),
            enforce_interval,
        }
    }

    #[must_use]
    pub fn level(&self) -> f32 {
        self.state.lock().level
    }

    /// A change coming from the user rather than from an alarm.
    pub fn set_level(&self, level: f32) {
        let mut state = self.state.lock();
        state.level = level.clamp(0.0, 1.0);
        if state.enforced.is_some() {
            info!("volume changed to {level} while an alarm enforces its own");
        }
    }

    #[must_use]
    pub fn has_focus(&self) -> bool {
        self.state.lock().focused
    }

    fn spawn_enforcer(&self) {
        let state = Arc::clone(&self.state);
        let interval = self.enforce_interval;
        thread::spawn(move || loop {
            thread::sleep(interval);
            let mut state = state.lock();
            match state.enforced {
                Some(level) if (state.level - level).abs() > f32::EPSILON => {
                    info!("putting enforced alarm volume {level} back");
                    state.level = level;
                }
                Some(_) => {}
                None => {
                    debug!("volume enforcement over");
                    state.enforcer_running = false;
                    break;
                }
            }
        });
    }
}

impl VolumeChannel for SoftwareVolume {
    fn current(&self) -> Result<f32, ChannelError> {
        Ok(self.level())
    }

    fn apply(&self, level: f32, enforced: bool) -> ChannelResult {
        let level = level.clamp(0.0, 1.0);
        let start_enforcer = {
            let mut state = self.state.lock();
            state.saved = Some(state.level);
            state.level = level;
            state.enforced = enforced.then_some(level);
            let start = enforced && !state.enforcer_running;
            state.enforcer_running |= start;
            start
        };
        info!("master volume set to {level} (enforced: {enforced})");
        if start_enforcer {
            self.spawn_enforcer();
        }
        Ok(())
    }

    fn restore(&self) -> ChannelResult {
        let mut state = self.state.lock();
        state.enforced = None;
        if let Some(saved) = state.saved.take() {
            info!("master volume restored to {saved}");
            state.level = saved;
        }
        Ok(())
    }

    fn request_focus(&self) -> ChannelResult {
        self.state.lock().focused = true;
        debug!("audio focus taken");
        Ok(())
    }

    fn release_focus(&self) -> ChannelResult {
        self.state.lock().focused = false;
        debug!("audio focus released");
        Ok(())
    }
}
