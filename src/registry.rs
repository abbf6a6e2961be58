//! # Ringing-alarm registry
//!
//! Process wide record of which alarms are ringing and which channels each of
//! them has engaged. The registry is owned by the alarm service and shared
//! with the coordinator and the teardown sequencer.
//!
//! ## Rules
//! - one entry per ringing id, created by `admit` and deleted by `remove`
//! - the global ringing set is the union of entry ids and the ids the audio
//!   driver last reported as playing
//! - all state sits behind one mutex, no driver is ever called while it is held
//! - operations on one id are serialized by that id's lock, admissions are
//!   serialized by the admission lock
//! - an id's lock lives only while the id rings or someone holds it

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use log::debug;
use parking_lot::{Mutex, MutexGuard};

use crate::{alarm::AlarmId, channel::Channel, error::Error};

/// Book keeping for one ringing alarm.
#[derive(Debug, Clone, PartialEq)]
pub struct RingingAlarmEntry {
    pub id: AlarmId,
    pub active_channels: BTreeSet<Channel>,
    /// system volume seen right before this alarm overrode it
    pub saved_system_volume: Option<f32>,
}

impl RingingAlarmEntry {
    #[must_use]
    pub const fn new(id: AlarmId) -> Self {
        Self {
            id,
            active_channels: BTreeSet::new(),
            saved_system_volume: None,
        }
    }

    #[must_use]
    pub fn is_active(&self, channel: Channel) -> bool {
        self.active_channels.contains(&channel)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<AlarmId, RingingAlarmEntry>,
    /// admission order of `entries`
    order: Vec<AlarmId>,
    /// last "currently playing" report of the audio driver
    playing: Vec<AlarmId>,
    id_locks: HashMap<AlarmId, Arc<Mutex<()>>>,
}

/// Registry of ringing alarms.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
    admission: Mutex<()>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_ringing(&self, id: AlarmId) -> bool {
        self.inner.lock().entries.contains_key(&id)
    }

    /// True if any alarm other than `excluding` is in the global ringing set.
    #[must_use]
    pub fn any_ringing(&self, excluding: Option<AlarmId>) -> bool {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .chain(&inner.playing)
            .any(|id| Some(*id) != excluding)
    }

    /// Creates an empty entry for `id`.
    ///
    /// # Errors
    /// [`Error::AlreadyRinging`] if `id` has an entry.
    pub fn admit(&self, id: AlarmId) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&id) {
            return Err(Error::AlreadyRinging(id));
        }
        inner.entries.insert(id, RingingAlarmEntry::new(id));
        inner.order.push(id);
        debug!("registry: admitted alarm {id}");
        Ok(())
    }

    pub fn mark_channel_active(&self, id: AlarmId, channel: Channel) {
        if let Some(entry) = self.inner.lock().entries.get_mut(&id) {
            entry.active_channels.insert(channel);
        }
    }

    pub fn mark_channel_inactive(&self, id: AlarmId, channel: Channel) {
        if let Some(entry) = self.inner.lock().entries.get_mut(&id) {
            entry.active_channels.remove(&channel);
        }
    }

    /// Clears `channel` on every entry, for devices all alarms share.
    pub fn mark_channel_inactive_everywhere(&self, channel: Channel) {
        for entry in self.inner.lock().entries.values_mut() {
            entry.active_channels.remove(&channel);
        }
    }

    pub fn set_saved_volume(&self, id: AlarmId, level: f32) {
        if let Some(entry) = self.inner.lock().entries.get_mut(&id) {
            entry.saved_system_volume = Some(level);
        }
    }

    /// Copy of the entry for `id`.
    #[must_use]
    pub fn entry(&self, id: AlarmId) -> Option<RingingAlarmEntry> {
        self.inner.lock().entries.get(&id).cloned()
    }

    /// Deletes and returns the entry for `id`. The id also leaves the driver
    /// reported half of the ringing set, its playback is over.
    ///
    /// # Errors
    /// [`Error::NotRinging`] if `id` has no entry.
    pub fn remove(&self, id: AlarmId) -> Result<RingingAlarmEntry, Error> {
        let mut inner = self.inner.lock();
        inner.playing.retain(|other| *other != id);
        let entry = inner.entries.remove(&id).ok_or(Error::NotRinging(id))?;
        inner.order.retain(|other| *other != id);
        debug!("registry: removed alarm {id}");
        Ok(entry)
    }

    /// Ringing ids in admission order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AlarmId> {
        self.inner.lock().order.clone()
    }

    /// Replaces the audio driver's half of the global ringing set.
    pub fn refresh_playing(&self, playing: Vec<AlarmId>) {
        self.inner.lock().playing = playing;
    }

    /// The global ringing set: entries in admission order, then ids only the
    /// audio driver knows about.
    #[must_use]
    pub fn global_ringing(&self) -> Vec<AlarmId> {
        let inner = self.inner.lock();
        let mut ids = inner.order.clone();
        ids.extend(inner.playing.iter().filter(|id| !inner.entries.contains_key(*id)));
        ids
    }

    /// Forgets every alarm regardless of its state.
    pub fn clear(&self) -> Vec<RingingAlarmEntry> {
        let mut inner = self.inner.lock();
        inner.playing.clear();
        inner.id_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let order = std::mem::take(&mut inner.order);
        let mut entries = std::mem::take(&mut inner.entries);
        order
            .into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }

    /// Lock serializing every operation on `id`.
    #[must_use]
    pub fn id_lock(&self, id: AlarmId) -> Arc<Mutex<()>> {
        self.inner
            .lock()
            .id_locks
            .entry(id)
            .or_default()
            .clone()
    }

    /// Runs `f` holding `id`'s lock. The lock is dropped from the table once
    /// `id` stops ringing and nobody else holds or waits for it.
    pub fn serialized<R>(&self, id: AlarmId, f: impl FnOnce() -> R) -> R {
        let lock = self.id_lock(id);
        let result = {
            let _serial = lock.lock();
            f()
        };
        let mut inner = self.inner.lock();
        // the table and `lock` are the only owners left
        if !inner.entries.contains_key(&id) && Arc::strong_count(&lock) == 2 {
            inner.id_locks.remove(&id);
        }
        result
    }

    /// Lock serializing overlap checks together with the admission they allow.
    pub fn admission_lock(&self) -> MutexGuard<'_, ()> {
        self.admission.lock()
    }
}
