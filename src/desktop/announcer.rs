use std::{
    sync::{
        mpsc::{self, RecvTimeoutError, Sender},
        Arc,
    },
    thread,
    time::Duration,
};

use chrono::{Local, Timelike};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::channel::{Announcement, AnnouncementText, Announcer, AudioChannel, ChannelResult};

/// Spoken form of a wall clock time: `8 o'clock` on the hour, `8:05` otherwise.
#[must_use]
pub fn format_time_text(hour: u32, minute: u32) -> String {
    if minute == 0 {
        format!("{hour} o'clock")
    } else {
        format!("{hour}:{minute:02}")
    }
}

fn current_time_text() -> String {
    let now = Local::now();
    format_time_text(now.hour(), now.minute())
}

/// Announcer without a speech engine: each utterance goes to stdout and the log.
///
/// Announcements that ask for it duck the alarm audio for `duck_hold` around
/// every utterance.
pub struct ConsoleAnnouncer {
    name: &'static str,
    audio: Option<Arc<dyn AudioChannel>>,
    duck_hold: Duration,
    /// dropping the sender ends the speech loop
    running: Mutex<Option<Sender<()>>>,
}

impl ConsoleAnnouncer {
    #[must_use]
    pub fn new(
        name: &'static str,
        audio: Option<Arc<dyn AudioChannel>>,
        duck_hold: Duration,
    ) -> Self {
        Self {
            name,
            audio,
            duck_hold,
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.running.lock().is_some()
    }
}

struct SpeechLoop {
    name: &'static str,
    announcement: Announcement,
    audio: Option<Arc<dyn AudioChannel>>,
    duck_hold: Duration,
}

impl SpeechLoop {
    fn text(&self) -> String {
        match &self.announcement.text {
            AnnouncementText::Fixed(text) => text.clone(),
            AnnouncementText::CurrentTime => current_time_text(),
        }
    }

    /// Says the text once. Returns false if the loop was cancelled meanwhile.
    fn utter(&self, stop: &mpsc::Receiver<()>) -> bool {
        let ducking = self.announcement.duck_audio.zip(self.audio.as_ref());
        if let Some((level, audio)) = ducking {
            if let Err(e) = audio.duck(level) {
                warn!("{}: couldn't duck alarm audio: {e}", self.name);
            }
        }
        let text = self.text();
        info!(
            "{} for alarm {} says {text:?} (volume {}, rate {}, pitch {})",
            self.name,
            self.announcement.alarm,
            self.announcement.volume,
            self.announcement.rate,
            self.announcement.pitch
        );
        println!("[alarm {}] {text}", self.announcement.alarm);
        let cancelled = match ducking {
            Some((_, audio)) => {
                let cancelled = is_cancelled(stop.recv_timeout(self.duck_hold));
                if let Err(e) = audio.unduck() {
                    warn!("{}: couldn't restore alarm audio: {e}", self.name);
                }
                cancelled
            }
            None => false,
        };
        !cancelled
    }

    fn run(self, stop: &mpsc::Receiver<()>) {
        loop {
            if !self.utter(stop) || !self.announcement.loop_speech {
                break;
            }
            if is_cancelled(stop.recv_timeout(self.announcement.loop_interval)) {
                break;
            }
        }
        debug!("{} for alarm {} done", self.name, self.announcement.alarm);
    }
}

const fn is_cancelled(wait: Result<(), RecvTimeoutError>) -> bool {
    !matches!(wait, Err(RecvTimeoutError::Timeout))
}

impl Announcer for ConsoleAnnouncer {
    fn start(&self, announcement: &Announcement) -> ChannelResult {
        let (sender, receiver) = mpsc::channel();
        if self.running.lock().replace(sender).is_some() {
            debug!("{}: replaced a running announcement", self.name);
        }
        let speech = SpeechLoop {
            name: self.name,
            announcement: announcement.clone(),
            audio: self.audio.clone(),
            duck_hold: self.duck_hold,
        };
        thread::spawn(move || speech.run(&receiver));
        Ok(())
    }

    fn stop(&self) -> ChannelResult {
        if self.running.lock().take().is_some() {
            debug!("{} stopped", self.name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConsoleAnnouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleAnnouncer")
            .field("name", &self.name)
            .field("duck_hold", &self.duck_hold)
            .field("speaking", &self.is_speaking())
            .finish_non_exhaustive()
    }
}
