//! Schedule state and its persistence.

use crate::atomic::write_atomic;
use crate::error::PersistenceError;
use crate::interval::IntervalKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The feeding schedule. `next_feeding` is `None` exactly when no schedule
/// has been set (or it was cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_feeding: Option<NaiveDateTime>,
    #[serde(default)]
    pub interval: IntervalKind,
}

impl Schedule {
    pub fn new(next_feeding: NaiveDateTime, interval: IntervalKind) -> Self {
        Self {
            next_feeding: Some(next_feeding),
            interval,
        }
    }

    pub fn is_set(&self) -> bool {
        self.next_feeding.is_some()
    }
}

/// Durable home of the schedule. Implementations report failures; the
/// scheduler decides they are never fatal.
pub trait ScheduleStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Schedule>, PersistenceError>;
    fn save(&self, schedule: &Schedule) -> Result<(), PersistenceError>;
}

impl<T: ScheduleStore + ?Sized> ScheduleStore for Box<T> {
    fn load(&self) -> Result<Option<Schedule>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, schedule: &Schedule) -> Result<(), PersistenceError> {
        (**self).save(schedule)
    }
}

/// TOML file written atomically on every save.
///
/// ```toml
/// next_feeding = "2026-10-17T08:00:00"
/// interval = "Every Day"
/// ```
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileScheduleStore {
    fn load(&self) -> Result<Option<Schedule>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(toml::from_str::<Schedule>(&text)?))
    }

    fn save(&self, schedule: &Schedule) -> Result<(), PersistenceError> {
        let text = toml::to_string(schedule)?;
        write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_omits_unset_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScheduleStore::new(dir.path().join("sched.toml"));
        assert_eq!(store.load().unwrap(), None);

        let when = NaiveDateTime::parse_from_str("2026-10-17 08:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let sched = Schedule::new(when, IntervalKind::Twice);
        store.save(&sched).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("interval = \"Twice a Day\""), "{text}");
        assert!(text.contains("2026-10-17T08:00:00"), "{text}");
        assert_eq!(store.load().unwrap(), Some(sched));

        store.save(&Schedule::default()).unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(!text.contains("next_feeding"), "{text}");
        assert_eq!(store.load().unwrap(), Some(Schedule::default()));
    }

    #[test]
    fn malformed_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sched.toml");
        std::fs::write(&path, "interval = \"Every Fortnight\"\n").unwrap();
        let err = FileScheduleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Decode(_)));
    }
}
