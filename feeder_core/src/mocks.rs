//! Test and helper doubles for feeder_core

use crate::error::PersistenceError;
use crate::schedule::{Schedule, ScheduleStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory schedule store. Clones share state, so a test can keep one
/// clone to inspect what the scheduler saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduleStore {
    slot: Arc<Mutex<Option<Schedule>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryScheduleStore {
    pub fn with(schedule: Schedule) -> Self {
        let store = Self::default();
        if let Ok(mut slot) = store.slot.lock() {
            *slot = Some(schedule);
        }
        store
    }

    pub fn current(&self) -> Option<Schedule> {
        self.slot.lock().ok().and_then(|s| *s)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn load(&self) -> Result<Option<Schedule>, PersistenceError> {
        Ok(self.current())
    }

    fn save(&self, schedule: &Schedule) -> Result<(), PersistenceError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(*schedule);
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A store whose disk is always broken.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingStore;

impl ScheduleStore for FailingStore {
    fn load(&self) -> Result<Option<Schedule>, PersistenceError> {
        Err(std::io::Error::other("disk unavailable").into())
    }

    fn save(&self, _schedule: &Schedule) -> Result<(), PersistenceError> {
        Err(std::io::Error::other("disk unavailable").into())
    }
}
