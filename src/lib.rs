#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(
    clippy::use_self,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::missing_panics_doc
)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Ringing alarm orchestration.
//!
//! When an alarm fires, [`AlarmService`] decides whether it may ring, then
//! brings up its channels (volume override, flashlight, audio, vibration,
//! announcements) in a fixed order. Edits change single channels of a ringing
//! alarm, stops release everything the alarm holds.
//!
//! Hardware is reached through the traits in [`channel`]; [`desktop`] has
//! implementations for a desktop session.

pub mod alarm;
/// partial changes to a ringing alarm
pub mod alarm_edit;
pub mod channel;
pub mod communication;
pub mod config;
pub mod coordinator;
pub mod desktop;
pub mod error;
pub mod notify;
pub mod registry;
pub mod service;
pub mod session;
pub mod step;
pub mod teardown;

#[cfg(test)]
pub(crate) mod testing;

pub use alarm::{AlarmConfiguration, AlarmId};
pub use alarm_edit::EditSettings;
pub use channel::{Channel, Channels};
pub use coordinator::{Admission, RejectReason, RingOptions};
pub use error::Error;
pub use service::AlarmService;
pub use teardown::StopReason;
