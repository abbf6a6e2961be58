use std::sync::mpsc::Sender;

use log::{debug, warn};

use crate::{alarm::AlarmId, communication::HostEvent, error::NotifyError};

/// Tells the host application about ring and stop transitions.
///
/// Delivery is fire and forget: the core logs a failure and moves on, it never
/// retries.
pub trait Notifier: Send + Sync {
    /// # Errors
    /// The host could not be reached or refused the notification.
    fn alarm_rang(&self, id: AlarmId) -> Result<(), NotifyError>;

    /// # Errors
    /// The host could not be reached or refused the notification.
    fn alarm_stopped(&self, id: AlarmId) -> Result<(), NotifyError>;
}

pub(crate) fn rang(notifier: &dyn Notifier, id: AlarmId) {
    match notifier.alarm_rang(id) {
        Ok(()) => debug!("alarm rang notification for {id} was processed"),
        Err(e) => warn!("alarm rang notification for {id} failed: {e}"),
    }
}

pub(crate) fn stopped(notifier: &dyn Notifier, id: AlarmId) {
    match notifier.alarm_stopped(id) {
        Ok(()) => debug!("alarm stopped notification for {id} was processed"),
        Err(e) => warn!("alarm stopped notification for {id} failed: {e}"),
    }
}

/// Forwards transitions over a channel to whatever loop serves the host.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: Sender<HostEvent>,
}

impl ChannelNotifier {
    #[must_use]
    pub const fn new(sender: Sender<HostEvent>) -> Self {
        Self { sender }
    }

    fn send(&self, event: HostEvent) -> Result<(), NotifyError> {
        self.sender
            .send(event)
            .map_err(|_| NotifyError::Disconnected)
    }
}

impl Notifier for ChannelNotifier {
    fn alarm_rang(&self, id: AlarmId) -> Result<(), NotifyError> {
        self.send(HostEvent::AlarmRang(id))
    }

    fn alarm_stopped(&self, id: AlarmId) -> Result<(), NotifyError> {
        self.send(HostEvent::AlarmStopped(id))
    }
}
