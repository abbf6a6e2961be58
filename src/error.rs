//! Error types of the ringing core.
//!
//! - [`Error`]: contract violations and boundary failures that reach the caller.
//! - [`ChannelError`]: a single driver primitive failed. These are captured per
//!   step and logged, they never abort an activation, edit or teardown.
//! - [`NotifyError`]: the host did not take a ring/stop notification.

use thiserror::Error;

use crate::alarm::AlarmId;

/// Errors surfaced to callers of the alarm service.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Admission was requested for an id that already has a ringing episode.
    /// Changing a ringing alarm goes through an edit.
    #[error("alarm {0} is already ringing")]
    AlreadyRinging(AlarmId),

    /// The id has no ringing episode.
    #[error("alarm {0} is not ringing")]
    NotRinging(AlarmId),

    /// Alarm settings were absent or could not be decoded; nothing was engaged.
    #[error("alarm settings missing or malformed: {0}")]
    ConfigurationMissing(String),

    /// A channel primitive failed.
    #[error("{step} failed: {source}")]
    ChannelDriverFailure {
        step: &'static str,
        #[source]
        source: ChannelError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("couldn't serialize config: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::AlreadyRinging(_) => "already_ringing",
            Self::NotRinging(_) => "not_ringing",
            Self::ConfigurationMissing(_) => "configuration_missing",
            Self::ChannelDriverFailure { .. } => "channel_driver_failure",
            Self::Io(_) => "io",
            Self::Toml(_) => "toml",
        }
    }
}

/// Failure of one driver primitive.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The hardware behind the driver is gone or was never there.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("driver error: {0}")]
    Driver(String),

    /// The driver panicked; the panic was contained.
    #[error("driver panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to hand a transition over to the host application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Nobody is listening on the other side anymore.
    #[error("host disconnected")]
    Disconnected,

    #[error("host rejected notification: {0}")]
    Rejected(String),
}
