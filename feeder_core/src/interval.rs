//! Feeding recurrence policy.
//!
//! Pure functions from an interval kind and a base instant to the next
//! occurrence. Catch-up after downtime is closed form for every kind, so a
//! week offline costs the same as a minute.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recurrence of the feeding schedule. Persisted by its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IntervalKind {
    #[default]
    #[serde(rename = "Every Day")]
    Daily,
    #[serde(rename = "Every 2 Hours")]
    Every2h,
    #[serde(rename = "Every 3 Hours")]
    Every3h,
    #[serde(rename = "Every 4 Hours")]
    Every4h,
    #[serde(rename = "Every 6 Hours")]
    Every6h,
    #[serde(rename = "Every 8 Hours")]
    Every8h,
    #[serde(rename = "Every 12 Hours")]
    Every12h,
    #[serde(rename = "Twice a Day")]
    Twice,
    #[serde(rename = "Three Times a Day")]
    Thrice,
}

impl IntervalKind {
    pub const ALL: [IntervalKind; 9] = [
        IntervalKind::Daily,
        IntervalKind::Every2h,
        IntervalKind::Every3h,
        IntervalKind::Every4h,
        IntervalKind::Every6h,
        IntervalKind::Every8h,
        IntervalKind::Every12h,
        IntervalKind::Twice,
        IntervalKind::Thrice,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IntervalKind::Daily => "Every Day",
            IntervalKind::Every2h => "Every 2 Hours",
            IntervalKind::Every3h => "Every 3 Hours",
            IntervalKind::Every4h => "Every 4 Hours",
            IntervalKind::Every6h => "Every 6 Hours",
            IntervalKind::Every8h => "Every 8 Hours",
            IntervalKind::Every12h => "Every 12 Hours",
            IntervalKind::Twice => "Twice a Day",
            IntervalKind::Thrice => "Three Times a Day",
        }
    }

    /// Distance between two consecutive feedings.
    pub fn step(self) -> TimeDelta {
        match self {
            IntervalKind::Daily => TimeDelta::days(1),
            IntervalKind::Every2h => TimeDelta::hours(2),
            IntervalKind::Every3h => TimeDelta::hours(3),
            IntervalKind::Every4h => TimeDelta::hours(4),
            IntervalKind::Every6h => TimeDelta::hours(6),
            IntervalKind::Every8h | IntervalKind::Thrice => TimeDelta::hours(8),
            IntervalKind::Every12h | IntervalKind::Twice => TimeDelta::hours(12),
        }
    }

    /// Number of feedings anchored to one time of day, or `None` for plain
    /// fixed-step kinds.
    pub fn daily_phases(self) -> Option<i32> {
        match self {
            IntervalKind::Twice => Some(2),
            IntervalKind::Thrice => Some(3),
            _ => None,
        }
    }

    /// One step forward from `base`.
    pub fn advance(self, base: NaiveDateTime) -> NaiveDateTime {
        add(base, self.step())
    }

    /// First occurrence strictly after `now`.
    ///
    /// A `base` still in the future is returned unchanged. `base == now`
    /// counts as already due, so the result is the following occurrence.
    pub fn next_after(self, base: NaiveDateTime, now: NaiveDateTime) -> NaiveDateTime {
        if base > now {
            return base;
        }
        match self.daily_phases() {
            None => {
                let step_ms = self.step().num_milliseconds();
                let elapsed_ms = (now - base).num_milliseconds();
                let whole = elapsed_ms / step_ms + 1;
                add(base, TimeDelta::milliseconds(whole.saturating_mul(step_ms)))
            }
            Some(phases) => self.next_phase_after(base, phases, now),
        }
    }

    // Candidates are anchor, anchor+step, ... on yesterday, today and tomorrow;
    // yesterday covers phases that wrapped past midnight.
    fn next_phase_after(self, base: NaiveDateTime, phases: i32, now: NaiveDateTime) -> NaiveDateTime {
        let time_of_day = base.time();
        let step = self.step();
        let today = now.date();
        let days = [today.pred_opt(), Some(today), today.succ_opt()];

        let mut best: Option<NaiveDateTime> = None;
        for day in days.into_iter().flatten() {
            let anchor = day.and_time(time_of_day);
            for k in 0..phases {
                let candidate = add(anchor, step * k);
                if candidate > now && candidate >= base && best.is_none_or(|b| candidate < b) {
                    best = Some(candidate);
                }
            }
        }
        // Tomorrow's anchor is always after `now`; reaching this means the
        // calendar ran out.
        best.unwrap_or(NaiveDateTime::MAX)
    }

    /// Next feeding for a schedule freshly set to `time_of_day`.
    pub fn first_occurrence(self, time_of_day: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
        self.next_after(now.date().and_time(time_of_day), now)
    }
}

fn add(base: NaiveDateTime, d: TimeDelta) -> NaiveDateTime {
    base.checked_add_signed(d).unwrap_or(NaiveDateTime::MAX)
}

impl fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interval {0:?} (expected e.g. \"Every Day\", daily, 2h, 3h, 4h, 6h, 8h, 12h, twice, thrice)")]
pub struct UnknownInterval(pub String);

impl FromStr for IntervalKind {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if let Some(k) = Self::ALL.iter().find(|k| k.label().eq_ignore_ascii_case(t)) {
            return Ok(*k);
        }
        let kind = match t.to_ascii_lowercase().as_str() {
            "daily" | "day" | "1d" | "24h" => IntervalKind::Daily,
            "2h" => IntervalKind::Every2h,
            "3h" => IntervalKind::Every3h,
            "4h" => IntervalKind::Every4h,
            "6h" => IntervalKind::Every6h,
            "8h" => IntervalKind::Every8h,
            "12h" => IntervalKind::Every12h,
            "twice" => IntervalKind::Twice,
            "thrice" | "three" => IntervalKind::Thrice,
            _ => return Err(UnknownInterval(t.to_string())),
        };
        Ok(kind)
    }
}
