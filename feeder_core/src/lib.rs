#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core of the feeder console (hardware-agnostic).
//!
//! All device access goes through `feeder_traits::Connector`/`Transport`, and
//! all time through `Clock`/`WallClock`, so every component runs against the
//! simulated board and a test clock.
//!
//! ## Architecture
//!
//! - **Scheduling**: `IntervalKind` recurrence, `FeedingScheduler` due/miss
//!   detection with closed-form catch-up, `ScheduleStore` persistence
//! - **Serial**: `SerialLink` handshake and best-effort I/O, `Command` grammar,
//!   `LineBuffer` reassembly
//! - **Telemetry**: `classify`, `WeightStabilityTracker`, `FoodLevelState`
//! - **Log**: bounded `LogProducer` queue, `ThrottledLog`, batched `LogSink`
//! - **Orchestration**: `Console::tick`, `ConsoleHandle`, `FlushTimer`,
//!   `run_console`
//!
//! Everything the display adapter needs arrives as `ConsoleEvent`s on one
//! channel.

pub mod atomic;
pub mod command;
pub mod config;
pub mod console;
mod conversions;
pub mod driver;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod interval;
pub mod link;
pub mod log_sink;
pub mod mocks;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod telemetry;
pub mod throttle;
pub mod weight;

pub use command::Command;
pub use config::{ConsoleCfg, LinkCfg, LogSinkCfg, SchedulerCfg, ThrottleCfg, Timing, WeightCfg};
pub use console::{Console, ConsoleHandle};
pub use driver::{FlushTimer, run_console};
pub use error::{ConnError, ParseError, PersistenceError};
pub use events::{ConsoleEvent, EventRx, EventTx};
pub use interval::IntervalKind;
pub use link::{ConnectionState, LineBuffer, SerialLink};
pub use log_sink::{FlushOutcome, LogEntry, LogProducer, LogSink, Severity};
pub use schedule::{FileScheduleStore, Schedule, ScheduleStore};
pub use scheduler::{Countdown, DueFeeding, Evaluation, FeedingScheduler, Miss, Urgency};
pub use stats::CommandStats;
pub use telemetry::{FoodLevel, FoodLevelState, Telemetry, TelemetryKind, classify};
pub use throttle::{Throttled, ThrottledLog};
pub use weight::{WeightEvent, WeightLevel, WeightSample, WeightStabilityTracker};
