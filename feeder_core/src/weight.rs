//! Bowl weight tracking.
//!
//! Consecutive readings that differ by more than the change threshold become
//! `Dispensed` or `Consumed` events; after a change, the first reading that
//! moves less than the stable threshold emits `Stable` once. `WeightLevel`
//! buckets a reading for display.

use crate::config::WeightCfg;
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    pub grams: f64,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightEvent {
    /// Bowl gained more than the change threshold.
    Dispensed { delta_g: f64, total_g: f64 },
    /// Bowl lost more than the change threshold.
    Consumed { delta_g: f64, remaining_g: f64 },
    /// First settled sample after a change. Emitted once per settle.
    Stable { grams: f64 },
}

impl fmt::Display for WeightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightEvent::Dispensed { delta_g, total_g } => {
                write!(f, "Food dispensed detected: +{delta_g:.1}g (Total: {total_g:.1}g)")
            }
            WeightEvent::Consumed {
                delta_g,
                remaining_g,
            } => write!(
                f,
                "Pet feeding detected: -{delta_g:.1}g (Remaining: {remaining_g:.1}g)"
            ),
            WeightEvent::Stable { grams } => write!(f, "Weight stabilized at {grams:.1}g"),
        }
    }
}

/// Presentation band of the absolute bowl weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLevel {
    Full,
    Moderate,
    Low,
    Empty,
}

impl WeightLevel {
    pub fn of(grams: f64) -> Self {
        if grams >= 200.0 {
            WeightLevel::Full
        } else if grams >= 50.0 {
            WeightLevel::Moderate
        } else if grams >= 10.0 {
            WeightLevel::Low
        } else {
            WeightLevel::Empty
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeightLevel::Full => "Full",
            WeightLevel::Moderate => "Moderate",
            WeightLevel::Low => "Low",
            WeightLevel::Empty => "Empty",
        }
    }
}

/// Edge-triggered change/settle detection over consecutive weight samples.
///
/// Between the two thresholds lies a dead band: no event and no state change.
#[derive(Debug)]
pub struct WeightStabilityTracker {
    cfg: WeightCfg,
    previous: Option<WeightSample>,
    current: Option<WeightSample>,
    stable: bool,
}

impl WeightStabilityTracker {
    pub fn new(cfg: WeightCfg) -> Self {
        Self {
            cfg,
            previous: None,
            current: None,
            stable: true,
        }
    }

    pub fn observe(&mut self, sample: WeightSample) -> Option<WeightEvent> {
        let last = self.current.replace(sample);
        self.previous = last;
        // The first sample only seeds the baseline.
        let last = last?;

        let delta = sample.grams - last.grams;
        if delta.abs() > self.cfg.change_threshold_g {
            self.stable = false;
            return Some(if delta > 0.0 {
                WeightEvent::Dispensed {
                    delta_g: delta,
                    total_g: sample.grams,
                }
            } else {
                WeightEvent::Consumed {
                    delta_g: -delta,
                    remaining_g: sample.grams,
                }
            });
        }
        if delta.abs() < self.cfg.stable_threshold_g && !self.stable {
            self.stable = true;
            return Some(WeightEvent::Stable {
                grams: sample.grams,
            });
        }
        None
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn current(&self) -> Option<WeightSample> {
        self.current
    }

    pub fn previous(&self) -> Option<WeightSample> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(grams: f64) -> WeightSample {
        WeightSample {
            grams,
            at: Instant::now(),
        }
    }

    #[test]
    fn consumption_then_single_stable_edge() {
        let mut t = WeightStabilityTracker::new(WeightCfg::default());
        assert_eq!(t.observe(sample(120.0)), None);
        match t.observe(sample(95.0)) {
            Some(WeightEvent::Consumed { delta_g, remaining_g }) => {
                assert!((delta_g - 25.0).abs() < 1e-9);
                assert!((remaining_g - 95.0).abs() < 1e-9);
            }
            other => panic!("expected Consumed, got {other:?}"),
        }
        assert!(!t.is_stable());
        assert_eq!(t.observe(sample(94.5)), Some(WeightEvent::Stable { grams: 94.5 }));
        assert_eq!(t.observe(sample(94.4)), None);
        assert!(t.is_stable());
    }

    #[test]
    fn dead_band_changes_nothing() {
        let mut t = WeightStabilityTracker::new(WeightCfg::default());
        t.observe(sample(50.0));
        t.observe(sample(60.0));
        assert!(!t.is_stable());
        assert_eq!(t.observe(sample(63.0)), None);
        assert!(!t.is_stable());
        assert_eq!(t.previous().map(|s| s.grams), Some(60.0));
    }

    #[test]
    fn levels_and_messages() {
        assert_eq!(WeightLevel::of(200.0), WeightLevel::Full);
        assert_eq!(WeightLevel::of(199.9), WeightLevel::Moderate);
        assert_eq!(WeightLevel::of(10.0), WeightLevel::Low);
        assert_eq!(WeightLevel::of(9.99), WeightLevel::Empty);
        let e = WeightEvent::Dispensed {
            delta_g: 20.0,
            total_g: 140.0,
        };
        assert_eq!(e.to_string(), "Food dispensed detected: +20.0g (Total: 140.0g)");
    }
}
