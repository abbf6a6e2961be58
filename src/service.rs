//! # Alarm service
//!
//! The inbound surface of a ringing session. It owns the registry, the
//! coordinator and the teardown sequencer, and serializes every request per
//! alarm id: a stop or edit that races a fire waits until the fire has
//! engaged all of its channels.
//!
//! One service lives as long as the host session. It is created when the
//! session starts and torn down once with [`AlarmService::on_process_destroy`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{error, info};

use crate::{
    alarm::{AlarmConfiguration, AlarmId},
    alarm_edit::EditSettings,
    channel::Channels,
    coordinator::{Admission, Coordinator, LoopFlags, RingOptions},
    error::Error,
    notify::Notifier,
    registry::{Registry, RingingAlarmEntry},
    session::Session,
    step::{EditReport, TeardownReport},
    teardown::{StopReason, TeardownSequencer},
};

#[derive(Debug)]
pub struct AlarmService {
    registry: Arc<Registry>,
    coordinator: Coordinator,
    teardown: TeardownSequencer,
    destroyed: AtomicBool,
}

impl AlarmService {
    #[must_use]
    pub fn new(
        channels: Channels,
        notifier: Arc<dyn Notifier>,
        session: Arc<dyn Session>,
        options: RingOptions,
    ) -> Self {
        let registry = Arc::new(Registry::new());
        let loop_flags = LoopFlags::default();
        info!("alarm service up with {channels:?}");
        Self {
            coordinator: Coordinator::new(
                Arc::clone(&registry),
                channels.clone(),
                Arc::clone(&notifier),
                Arc::clone(&session),
                options,
                Arc::clone(&loop_flags),
            ),
            teardown: TeardownSequencer::new(
                Arc::clone(&registry),
                channels,
                notifier,
                session,
                loop_flags,
            ),
            registry,
            destroyed: AtomicBool::new(false),
        }
    }

    /// An alarm went off.
    ///
    /// A rejected alarm engages nothing. It still goes through the teardown
    /// with [`StopReason::OverlapRejected`], which tells the host it stopped so
    /// its bookkeeping (unpersisting the alarm) can run.
    ///
    /// # Errors
    /// [`Error::AlreadyRinging`] if `config.id` rings already and overlap is
    /// allowed.
    pub fn on_fire(&self, config: &AlarmConfiguration) -> Result<Admission, Error> {
        self.registry.serialized(config.id, || {
            let admission = self.coordinator.on_fire(config).inspect_err(|e| {
                error!("registry out of sync for alarm {}: {e}", config.id);
            })?;
            if let Admission::Rejected(reason) = &admission {
                info!("alarm {} rejected: {reason:?}", config.id);
                let _ = self.teardown.stop(config.id, StopReason::OverlapRejected);
            }
            Ok(admission)
        })
    }

    /// Decodes raw alarm settings and fires them.
    ///
    /// # Errors
    /// [`Error::ConfigurationMissing`] when `settings` is absent or malformed;
    /// nothing is engaged in that case.
    pub fn on_fire_settings(&self, settings: Option<&str>) -> Result<Admission, Error> {
        let settings = settings.ok_or_else(|| {
            error!("fire event is missing its alarm settings");
            Error::ConfigurationMissing("no alarm settings".to_string())
        })?;
        let config = AlarmConfiguration::from_toml(settings).inspect_err(|e| {
            error!("cannot decode alarm settings: {e}");
        })?;
        self.on_fire(&config)
    }

    /// Changes channels of a ringing alarm in place.
    ///
    /// # Errors
    /// [`Error::NotRinging`] if the alarm is not ringing.
    pub fn on_edit(&self, edit: &EditSettings) -> Result<EditReport, Error> {
        self.registry
            .serialized(edit.id, || self.coordinator.on_edit(edit))
    }

    /// The user or the host stopped an alarm. Stopping twice is harmless.
    pub fn on_stop_requested(&self, id: AlarmId) -> TeardownReport {
        self.registry
            .serialized(id, || self.teardown.stop(id, StopReason::Explicit))
    }

    /// Stops an alarm without telling the host.
    pub fn force_stop(&self, id: AlarmId) -> TeardownReport {
        self.registry
            .serialized(id, || self.teardown.stop(id, StopReason::Forced))
    }

    /// The host is destroying the session. Only the first call tears down,
    /// later ones return `None`.
    pub fn on_process_destroy(&self) -> Option<TeardownReport> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return None;
        }
        let _admission = self.registry.admission_lock();
        Some(self.teardown.force_teardown_all())
    }

    /// Ringing ids in the order they were admitted.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AlarmId> {
        self.registry.snapshot()
    }

    #[must_use]
    pub fn is_ringing(&self, id: AlarmId) -> bool {
        self.registry.is_ringing(id)
    }

    #[must_use]
    pub fn entry(&self, id: AlarmId) -> Option<RingingAlarmEntry> {
        self.registry.entry(id)
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
