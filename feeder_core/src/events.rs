//! The single ordered event stream consumed by the display adapter.

use crate::link::ConnectionState;
use crate::log_sink::LogEntry;
use crate::schedule::Schedule;
use crate::scheduler::Urgency;
use crate::telemetry::FoodLevel;
use crate::weight::WeightLevel;
use crossbeam_channel as xch;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    /// A log line made visible by a flush, in FIFO order.
    Log(LogEntry),
    /// Short status text such as "• Receiving data".
    Status(String),
    /// The visible log was emptied.
    Cleared,
    Connection(ConnectionState),
    Countdown { text: String, urgency: Urgency },
    Weight { grams: f64, level: WeightLevel },
    FoodLevel(FoodLevel),
    Schedule(Schedule),
}

pub type EventTx = xch::Sender<ConsoleEvent>;
pub type EventRx = xch::Receiver<ConsoleEvent>;

/// Unbounded: the display adapter must never stall the core.
pub fn channel() -> (EventTx, EventRx) {
    xch::unbounded()
}

/// Publish, ignoring a display adapter that has gone away.
pub(crate) fn publish(tx: &EventTx, event: ConsoleEvent) {
    if tx.send(event).is_err() {
        tracing::trace!("event dropped: no display adapter");
    }
}
