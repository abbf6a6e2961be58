use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use log::{debug, info};

use crate::{channel::ChannelResult, session::Session};

/// Session of a terminal host. There is no screen to take over and nothing
/// to keep awake, so it only keeps track of what was asked.
#[derive(Debug, Default)]
pub struct ConsoleSession {
    ringing_ui: AtomicBool,
    idle: AtomicBool,
}

impl ConsoleSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_showing_ringing_ui(&self) -> bool {
        self.ringing_ui.load(Ordering::SeqCst)
    }

    /// Whether the last stop left no alarm ringing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }
}

impl Session for ConsoleSession {
    fn set_ringing_ui(&self, ringing: bool) -> ChannelResult {
        if self.ringing_ui.swap(ringing, Ordering::SeqCst) != ringing {
            info!("ringing screen {}", if ringing { "shown" } else { "hidden" });
        }
        self.idle.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn acquire_wake_lock(&self, timeout: Duration) -> ChannelResult {
        debug!("wake lock requested for {}s", timeout.as_secs());
        self.idle.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn release_foreground(&self) -> ChannelResult {
        debug!("foreground released");
        Ok(())
    }

    fn shutdown(&self) -> ChannelResult {
        info!("no alarm ringing anymore");
        self.idle.store(true, Ordering::SeqCst);
        Ok(())
    }
}
