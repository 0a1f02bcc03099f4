//! Feeding scheduler: owns the schedule, detects due feedings and catches up.
//!
//! State machine: `Unset -> Scheduled -> (Due -> Scheduled)`; `clear()` returns
//! to `Unset` from anywhere. Every mutation is persisted through a
//! [`ScheduleStore`]; persistence failures are logged and otherwise ignored so
//! the schedule keeps running in memory.

use crate::config::SchedulerCfg;
use crate::interval::IntervalKind;
use crate::schedule::{Schedule, ScheduleStore};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use std::fmt;

/// Display tier for the remaining time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Five minutes or less.
    Imminent,
    /// Thirty minutes or less.
    Soon,
    Normal,
}

impl Urgency {
    pub fn from_remaining(remaining: TimeDelta) -> Self {
        if remaining <= TimeDelta::minutes(5) {
            Urgency::Imminent
        } else if remaining <= TimeDelta::minutes(30) {
            Urgency::Soon
        } else {
            Urgency::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    /// Within the recent-miss window: fire the feeding.
    Recent,
    /// Older than the window (process asleep, machine off): skip it.
    Stale,
}

/// A feeding that came due during this evaluation. The schedule has already
/// been advanced to `next` and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueFeeding {
    pub scheduled: NaiveDateTime,
    pub late_by: TimeDelta,
    pub miss: Miss,
    pub next: NaiveDateTime,
}

impl DueFeeding {
    pub fn should_feed(&self) -> bool {
        self.miss == Miss::Recent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Idle,
    DueNow(DueFeeding),
    TimeRemaining { remaining: TimeDelta, urgency: Urgency },
}

/// Countdown text: `1d 02h 03m 04s`, `02h 03m 04s` or `03m 04s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown(pub TimeDelta);

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.num_seconds().max(0);
        let (days, rem) = (total / 86_400, total % 86_400);
        let (hours, rem) = (rem / 3600, rem % 3600);
        let (mins, secs) = (rem / 60, rem % 60);
        if days > 0 {
            write!(f, "{days}d {hours:02}h {mins:02}m {secs:02}s")
        } else if hours > 0 {
            write!(f, "{hours:02}h {mins:02}m {secs:02}s")
        } else {
            write!(f, "{mins:02}m {secs:02}s")
        }
    }
}

pub struct FeedingScheduler<S: ScheduleStore> {
    schedule: Schedule,
    store: S,
    cfg: SchedulerCfg,
}

impl<S: ScheduleStore> FeedingScheduler<S> {
    /// Load the persisted schedule once. Unreadable state falls back to an
    /// unset schedule.
    pub fn load(store: S, cfg: SchedulerCfg) -> Self {
        let schedule = match store.load() {
            Ok(Some(s)) => {
                tracing::info!(next = ?s.next_feeding, interval = %s.interval, "schedule loaded");
                s
            }
            Ok(None) => Schedule::default(),
            Err(e) => {
                tracing::warn!(error = %e, "schedule load failed; starting unset");
                Schedule::default()
            }
        };
        Self {
            schedule,
            store,
            cfg,
        }
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Time of day the schedule is anchored to.
    pub fn anchor_time(&self) -> Option<NaiveTime> {
        self.schedule.next_feeding.map(|t| t.time())
    }

    pub fn set_schedule(&mut self, next_feeding: NaiveDateTime, interval: IntervalKind) {
        self.schedule = Schedule::new(next_feeding, interval);
        tracing::info!(next = %next_feeding, interval = %interval, "schedule set");
        self.persist();
    }

    /// Schedule from a time of day, the way an operator picks one.
    pub fn set_daily_time(
        &mut self,
        time_of_day: NaiveTime,
        interval: IntervalKind,
        now: NaiveDateTime,
    ) -> NaiveDateTime {
        let next = interval.first_occurrence(time_of_day, now);
        self.set_schedule(next, interval);
        next
    }

    pub fn clear(&mut self) {
        self.schedule = Schedule::default();
        tracing::info!("schedule cleared");
        self.persist();
    }

    /// Called once per tick.
    pub fn evaluate(&mut self, now: NaiveDateTime) -> Evaluation {
        let Some(scheduled) = self.schedule.next_feeding else {
            return Evaluation::Idle;
        };
        if now < scheduled {
            let remaining = scheduled - now;
            return Evaluation::TimeRemaining {
                remaining,
                urgency: Urgency::from_remaining(remaining),
            };
        }

        let late_by = now - scheduled;
        let miss = if late_by <= self.cfg.recent_miss {
            Miss::Recent
        } else {
            Miss::Stale
        };
        let next = self.schedule.interval.next_after(scheduled, now);
        self.schedule.next_feeding = Some(next);
        tracing::info!(%scheduled, %next, ?miss, "feeding due");
        self.persist();

        Evaluation::DueNow(DueFeeding {
            scheduled,
            late_by,
            miss,
            next,
        })
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.schedule) {
            tracing::warn!(error = %e, "schedule save failed; keeping it in memory");
        }
    }
}
