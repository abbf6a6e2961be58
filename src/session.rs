use std::time::Duration;

use crate::channel::ChannelResult;

/// Hooks into the host session that keeps the process alive while alarms ring.
pub trait Session: Send + Sync {
    /// Shows or hides the full screen ringing UI.
    fn set_ringing_ui(&self, ringing: bool) -> ChannelResult;

    /// Keeps the device awake for at most `timeout`.
    fn acquire_wake_lock(&self, timeout: Duration) -> ChannelResult;

    /// Drops the foreground/visible indicator of the session.
    fn release_foreground(&self) -> ChannelResult;

    /// No alarm is left ringing, the session may end.
    fn shutdown(&self) -> ChannelResult;
}

/// Session for hosts that have none of these concepts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedSession;

impl Session for DetachedSession {
    fn set_ringing_ui(&self, _ringing: bool) -> ChannelResult {
        Ok(())
    }

    fn acquire_wake_lock(&self, _timeout: Duration) -> ChannelResult {
        Ok(())
    }

    fn release_foreground(&self) -> ChannelResult {
        Ok(())
    }

    fn shutdown(&self) -> ChannelResult {
        Ok(())
    }
}
