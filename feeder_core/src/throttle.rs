//! Per-category throttling for high-frequency readings.
//!
//! The first entry of a category goes straight through. Further entries
//! inside the spacing window are counted instead of logged; the call that
//! brings the count to `max_duplicate_suppress` is logged as a summary
//! carrying the calls folded into it. A pending count rides along with the
//! next entry that gets through.

use crate::config::ThrottleCfg;
use crate::log_sink::{LogProducer, Severity};
use feeder_traits::Clock;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttled {
    /// Entry enqueued; `suppressed` earlier calls were folded into it.
    Emitted { suppressed: u32 },
    Suppressed,
}

#[derive(Debug, Clone, Copy)]
struct ThrottleRecord {
    last_emit: Instant,
    suppressed: u32,
}

pub struct ThrottledLog<K: Clock> {
    producer: LogProducer,
    clock: K,
    cfg: ThrottleCfg,
    records: HashMap<String, ThrottleRecord>,
}

impl<K: Clock> ThrottledLog<K> {
    pub fn new(producer: LogProducer, clock: K, cfg: ThrottleCfg) -> Self {
        Self {
            producer,
            clock,
            cfg,
            records: HashMap::new(),
        }
    }

    /// Unthrottled passthrough for state changes and errors.
    pub fn enqueue(&self, message: impl Into<String>, severity: Severity) -> bool {
        self.producer.enqueue(message, severity)
    }

    pub fn enqueue_throttled(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        key: &str,
    ) -> Throttled {
        let now = self.clock.now();
        let cap = self.cfg.max_duplicate_suppress.max(1);

        let suppressed = match self.records.get_mut(key) {
            None => 0,
            Some(rec) if now.saturating_duration_since(rec.last_emit) >= self.cfg.spacing => {
                rec.suppressed
            }
            Some(rec) => {
                rec.suppressed += 1;
                if rec.suppressed < cap {
                    return Throttled::Suppressed;
                }
                // This call is the summary entry itself.
                cap - 1
            }
        };

        self.records.insert(
            key.to_string(),
            ThrottleRecord {
                last_emit: now,
                suppressed: 0,
            },
        );
        self.producer
            .enqueue_with(message.into(), severity, suppressed);
        Throttled::Emitted { suppressed }
    }

    /// Calls folded since the last emitted entry of `key`.
    pub fn pending(&self, key: &str) -> u32 {
        self.records.get(key).map_or(0, |r| r.suppressed)
    }

    pub fn producer(&self) -> &LogProducer {
        &self.producer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogSinkCfg;
    use crate::events;
    use crate::log_sink::LogSink;
    use feeder_traits::test_clock::TestClock;
    use std::time::Duration;

    #[test]
    fn spaced_calls_all_pass_and_carry_pending_count() {
        let clock = TestClock::new();
        let (tx, _rx) = events::channel();
        let sink = LogSink::new(LogSinkCfg::default(), clock.clone(), clock.clone(), tx);
        let mut log = ThrottledLog::new(sink.producer(), clock.clone(), ThrottleCfg::default());

        assert_eq!(
            log.enqueue_throttled("Distance: 4 cm", Severity::Sensor, "distance_reading"),
            Throttled::Emitted { suppressed: 0 }
        );
        clock.advance(Duration::from_millis(300));
        assert_eq!(
            log.enqueue_throttled("Distance: 4 cm", Severity::Sensor, "distance_reading"),
            Throttled::Suppressed
        );
        // Other keys are independent.
        assert_eq!(
            log.enqueue_throttled("Weight: 1g", Severity::Weight, "weight_reading"),
            Throttled::Emitted { suppressed: 0 }
        );
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            log.enqueue_throttled("Distance: 5 cm", Severity::Sensor, "distance_reading"),
            Throttled::Emitted { suppressed: 1 }
        );
        assert_eq!(log.pending("distance_reading"), 0);

        sink.flush_all();
        let lines = sink.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].suppressed, 1);
    }
}
