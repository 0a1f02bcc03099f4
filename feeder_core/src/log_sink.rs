//! Back-pressure aware log: many producers, one periodic consumer.
//!
//! Producers push onto a bounded queue and never block; overflow is dropped
//! and counted. `LogSink::flush` moves at most one batch into the visible
//! log, trimming the oldest lines in whole blocks to stay under the cap, and
//! publishes the batch on the event channel.

use crate::config::LogSinkCfg;
use crate::events::{ConsoleEvent, EventTx, publish};
use chrono::NaiveDateTime;
use crossbeam_channel as xch;
use feeder_traits::{Clock, WallClock};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Instant;

pub const STATUS_RECEIVING: &str = "• Receiving data";
pub const STATUS_CLEARED: &str = "• Log cleared";

/// Colour tag of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
    Feed,
    Sensor,
    Weight,
    Muted,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Feed => "feed",
            Severity::Sensor => "sensor",
            Severity::Weight => "weight",
            Severity::Muted => "muted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    pub timestamp: NaiveDateTime,
    /// Near-duplicates folded into this entry.
    pub suppressed: u32,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)?;
        if self.suppressed > 0 {
            write!(f, " (+{} similar suppressed)", self.suppressed)?;
        }
        Ok(())
    }
}

/// Producer half. Cheap to clone and safe to use from any thread.
#[derive(Clone)]
pub struct LogProducer {
    tx: xch::Sender<LogEntry>,
    dropped: Arc<AtomicU64>,
    wall: Arc<dyn WallClock + Send + Sync>,
}

impl fmt::Debug for LogProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogProducer")
            .field("depth", &self.tx.len())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl LogProducer {
    /// Never blocks. Returns false when the queue was full and the entry was
    /// dropped.
    pub fn enqueue(&self, message: impl Into<String>, severity: Severity) -> bool {
        self.enqueue_with(message.into(), severity, 0)
    }

    pub(crate) fn enqueue_with(&self, message: String, severity: Severity, suppressed: u32) -> bool {
        let entry = LogEntry {
            message,
            severity,
            timestamp: self.wall.now_local(),
            suppressed,
        };
        match self.tx.try_send(entry) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            // Sink gone (shutdown): nothing left to display it.
            Err(xch::TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn depth(&self) -> usize {
        self.tx.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush holds the guard.
    Busy,
    /// Not enough queued yet and the minimum interval has not elapsed.
    Skipped,
    Flushed {
        appended: usize,
        trimmed: usize,
        dropped: u64,
    },
}

struct SinkState {
    visible: VecDeque<LogEntry>,
    last_flush: Option<Instant>,
    last_status: Option<Instant>,
}

/// Consumer half: owns the visible log.
pub struct LogSink<K: Clock> {
    cfg: LogSinkCfg,
    rx: xch::Receiver<LogEntry>,
    producer: LogProducer,
    dropped: Arc<AtomicU64>,
    clock: K,
    events: EventTx,
    // Flush re-entrancy guard; the only lock on the log path.
    state: Mutex<SinkState>,
}

impl<K: Clock> LogSink<K> {
    pub fn new<W>(cfg: LogSinkCfg, clock: K, wall: W, events: EventTx) -> Self
    where
        W: WallClock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(cfg.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let producer = LogProducer {
            tx,
            dropped: dropped.clone(),
            wall: Arc::new(wall),
        };
        Self {
            state: Mutex::new(SinkState {
                visible: VecDeque::with_capacity(cfg.max_lines.min(4096)),
                last_flush: None,
                last_status: None,
            }),
            cfg,
            rx,
            producer,
            dropped,
            clock,
            events,
        }
    }

    pub fn producer(&self) -> LogProducer {
        self.producer.clone()
    }

    pub fn depth(&self) -> usize {
        self.rx.len()
    }

    /// One periodic flush cycle.
    pub fn flush(&self) -> FlushOutcome {
        let mut st = match self.state.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return FlushOutcome::Busy,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };

        let depth = self.rx.len();
        let pending_drops = self.dropped.load(Ordering::Relaxed);
        if depth == 0 && pending_drops == 0 {
            return FlushOutcome::Skipped;
        }
        let now = self.clock.now();
        let interval_elapsed = st
            .last_flush
            .is_none_or(|t| now.saturating_duration_since(t) >= self.cfg.min_flush_interval);
        let near_full = depth >= self.cfg.near_full_depth();
        if depth < self.cfg.min_flush_depth && !interval_elapsed && !near_full {
            return FlushOutcome::Skipped;
        }

        let (batch, dropped) = self.take_batch();
        let appended = batch.len();
        let trimmed = self.append(&mut st, batch);

        if st
            .last_status
            .is_none_or(|t| now.saturating_duration_since(t) >= self.cfg.status_interval)
        {
            st.last_status = Some(now);
            publish(&self.events, ConsoleEvent::Status(STATUS_RECEIVING.to_string()));
        }
        st.last_flush = Some(now);

        FlushOutcome::Flushed {
            appended,
            trimmed,
            dropped,
        }
    }

    /// Drain the whole queue, ignoring the skip rules. For shutdown and
    /// one-shot commands.
    pub fn flush_all(&self) -> usize {
        let mut total = 0;
        loop {
            match self.flush_now() {
                0 => return total,
                n => total += n,
            }
        }
    }

    fn flush_now(&self) -> usize {
        let mut st = self.lock();
        let (batch, _) = self.take_batch();
        let n = batch.len();
        self.append(&mut st, batch);
        n
    }

    /// Up to one batch from the queue, plus a warning line when producers
    /// dropped entries since the last batch.
    fn take_batch(&self) -> (Vec<LogEntry>, u64) {
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let limit = self.cfg.batch_size.min(self.cfg.max_lines).max(1);
        let mut batch: Vec<LogEntry> = self.rx.try_iter().take(limit).collect();
        if dropped > 0 {
            tracing::warn!(dropped, "log queue overflowed");
            batch.push(LogEntry {
                message: format!("{dropped} log entries dropped (queue full)"),
                severity: Severity::Warning,
                timestamp: self.producer.wall.now_local(),
                suppressed: 0,
            });
        }
        (batch, dropped)
    }

    // Trims whole blocks of the oldest lines first, so the new batch is never cut.
    fn append(&self, st: &mut SinkState, batch: Vec<LogEntry>) -> usize {
        let block = self.cfg.trim_block();
        let mut trimmed = 0;
        while !st.visible.is_empty() && st.visible.len() + batch.len() > self.cfg.max_lines {
            let n = block.min(st.visible.len());
            st.visible.drain(..n);
            trimmed += n;
        }
        for entry in batch {
            publish(&self.events, ConsoleEvent::Log(entry.clone()));
            st.visible.push_back(entry);
        }
        trimmed
    }

    /// Empty the visible log and say so.
    pub fn clear(&self) {
        let mut st = self.lock();
        st.visible.clear();
        publish(&self.events, ConsoleEvent::Cleared);
        let entry = LogEntry {
            message: "Log cleared by user".to_string(),
            severity: Severity::Warning,
            timestamp: self.producer.wall.now_local(),
            suppressed: 0,
        };
        self.append(&mut st, vec![entry]);
        publish(&self.events, ConsoleEvent::Status(STATUS_CLEARED.to_string()));
    }

    /// Snapshot of the visible log, oldest first.
    pub fn lines(&self) -> Vec<LogEntry> {
        self.lock().visible.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}
