//! The orchestrator: one tick evaluates the schedule, drains the serial link
//! and routes every inbound line to the trackers and the log.
//!
//! Nothing in `tick` returns an error. Failures become log entries so one bad
//! line or one I/O hiccup cannot stop the next tick.

use crate::command::Command;
use crate::config::{ConsoleCfg, ThrottleCfg};
use crate::error::ConnError;
use crate::events::{ConsoleEvent, EventTx, publish};
use crate::interval::IntervalKind;
use crate::link::{ConnectionState, LineBuffer, SerialLink};
use crate::log_sink::{LogProducer, Severity};
use crate::schedule::{Schedule, ScheduleStore};
use crate::scheduler::{Countdown, Evaluation, FeedingScheduler};
use crate::stats::CommandStats;
use crate::telemetry::{FoodLevel, FoodLevelState, TelemetryKind, classify};
use crate::throttle::ThrottledLog;
use crate::weight::{WeightEvent, WeightLevel, WeightSample, WeightStabilityTracker};
use chrono::{NaiveDateTime, NaiveTime};
use crossbeam_channel as xch;
use feeder_traits::{Clock, Connector, WallClock};
use std::time::Duration;

// Pauses used by the stress test between commands and between rounds.
const STRESS_COMMAND_GAP: Duration = Duration::from_millis(200);
const STRESS_ROUND_GAP: Duration = Duration::from_secs(1);

/// Requests from other threads, served at the start of each tick (or
/// immediately by `run_console`).
pub enum Request {
    SetSchedule {
        time: NaiveTime,
        interval: IntervalKind,
        reply: xch::Sender<NaiveDateTime>,
    },
    GetSchedule(xch::Sender<Schedule>),
    ClearSchedule,
    IsConnected(xch::Sender<bool>),
    SendCommand(Command, xch::Sender<bool>),
    Connect(xch::Sender<Result<ConnectionState, ConnError>>),
    Disconnect(xch::Sender<bool>),
}

/// Cross-thread front door to a running `Console`. Every call returns `None`
/// once the console has shut down.
#[derive(Clone)]
pub struct ConsoleHandle {
    tx: xch::Sender<Request>,
    log: LogProducer,
}

impl ConsoleHandle {
    fn ask<T>(&self, make: impl FnOnce(xch::Sender<T>) -> Request) -> Option<T> {
        let (reply, rx) = xch::bounded(1);
        self.tx.send(make(reply)).ok()?;
        rx.recv().ok()
    }

    pub fn set_schedule(&self, time: NaiveTime, interval: IntervalKind) -> Option<NaiveDateTime> {
        self.ask(|reply| Request::SetSchedule {
            time,
            interval,
            reply,
        })
    }

    pub fn get_schedule(&self) -> Option<Schedule> {
        self.ask(Request::GetSchedule)
    }

    pub fn clear_schedule(&self) -> Option<()> {
        self.tx.send(Request::ClearSchedule).ok()
    }

    pub fn is_connected(&self) -> Option<bool> {
        self.ask(Request::IsConnected)
    }

    pub fn send_command(&self, command: Command) -> Option<bool> {
        self.ask(|reply| Request::SendCommand(command, reply))
    }

    pub fn connect(&self) -> Option<Result<ConnectionState, ConnError>> {
        self.ask(Request::Connect)
    }

    pub fn disconnect(&self) -> Option<bool> {
        self.ask(Request::Disconnect)
    }

    /// Goes straight to the log queue; never waits for the console.
    pub fn log_message(&self, message: impl Into<String>, severity: Severity) -> bool {
        self.log.enqueue(message, severity)
    }
}

pub struct Console<C, S, K>
where
    C: Connector,
    S: ScheduleStore,
    K: Clock + WallClock + Clone,
{
    cfg: ConsoleCfg,
    clock: K,
    link: SerialLink<C, K>,
    scheduler: FeedingScheduler<S>,
    lines: LineBuffer,
    weight: WeightStabilityTracker,
    food: FoodLevelState,
    log: ThrottledLog<K>,
    events: EventTx,
    req_tx: xch::Sender<Request>,
    req_rx: xch::Receiver<Request>,
}

impl<C, S, K> Console<C, S, K>
where
    C: Connector,
    S: ScheduleStore,
    K: Clock + WallClock + Clone,
{
    pub fn new(
        cfg: ConsoleCfg,
        connector: C,
        store: S,
        clock: K,
        log: LogProducer,
        throttle: ThrottleCfg,
        events: EventTx,
    ) -> Self {
        let (req_tx, req_rx) = xch::unbounded();
        Self {
            link: SerialLink::new(connector, clock.clone(), cfg.link.clone()),
            scheduler: FeedingScheduler::load(store, cfg.scheduler.clone()),
            lines: LineBuffer::new(),
            weight: WeightStabilityTracker::new(cfg.weight),
            food: FoodLevelState::new(),
            log: ThrottledLog::new(log, clock.clone(), throttle),
            clock,
            cfg,
            events,
            req_tx,
            req_rx,
        }
    }

    pub fn handle(&self) -> ConsoleHandle {
        ConsoleHandle {
            tx: self.req_tx.clone(),
            log: self.log.producer().clone(),
        }
    }

    pub(crate) fn requests(&self) -> &xch::Receiver<Request> {
        &self.req_rx
    }

    pub fn link(&self) -> &SerialLink<C, K> {
        &self.link
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    // ── connection ──────────────────────────────────────────────────────────

    /// Connect to the configured port.
    pub fn connect(&mut self) -> Result<ConnectionState, ConnError> {
        let port = self.cfg.port.clone();
        self.connect_to(&port, self.cfg.baud)
    }

    pub fn connect_to(&mut self, port: &str, baud: u32) -> Result<ConnectionState, ConnError> {
        if self.link.is_connected() {
            let open = self.link.port_name().unwrap_or(port).to_string();
            self.log_message(format!("Already connected to {open}"), Severity::Warning);
            return Ok(self.link.state());
        }
        self.log_message(format!("Connecting to {port} at {baud} baud..."), Severity::Info);
        let result = self.link.connect(port, baud);
        match &result {
            Ok(ConnectionState::Connected) => {
                self.lines.clear();
                self.log_message(
                    format!("Board connected successfully on {port} (PONG)"),
                    Severity::Success,
                );
            }
            Ok(ConnectionState::Degraded) => {
                self.lines.clear();
                self.log_message(
                    format!("No response from board on {port}; link kept open but unverified"),
                    Severity::Warning,
                );
            }
            Ok(_) => {}
            Err(e) => {
                self.log_message(e.to_string(), Severity::Error);
            }
        }
        publish(&self.events, ConsoleEvent::Connection(self.link.state()));
        result
    }

    pub fn disconnect(&mut self) -> bool {
        let port = self.link.port_name().unwrap_or_default().to_string();
        let closed = self.link.disconnect();
        if closed {
            self.log_message(format!("Disconnected from {port}"), Severity::Warning);
            publish(&self.events, ConsoleEvent::Connection(ConnectionState::Disconnected));
        } else {
            self.log_message("No port to disconnect", Severity::Muted);
        }
        closed
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn send_command(&mut self, command: &Command) -> bool {
        let sent = self.link.send(command);
        if sent {
            self.log_message(format!("Sent: {command}"), Severity::Muted);
        } else {
            self.log_message(format!("Failed to send {command}: not connected"), Severity::Error);
            self.publish_if_dropped();
        }
        sent
    }

    fn publish_if_dropped(&self) {
        if self.link.state() == ConnectionState::Disconnected {
            publish(&self.events, ConsoleEvent::Connection(ConnectionState::Disconnected));
        }
    }

    pub fn log_message(&self, message: impl Into<String>, severity: Severity) -> bool {
        self.log.enqueue(message, severity)
    }

    // ── schedule ────────────────────────────────────────────────────────────

    /// Schedule from a time of day; returns the first feeding instant.
    pub fn set_schedule(&mut self, time: NaiveTime, interval: IntervalKind) -> NaiveDateTime {
        let now = self.clock.now_local();
        let next = self.scheduler.set_daily_time(time, interval, now);
        self.schedule_updated(next, interval);
        next
    }

    /// Schedule an explicit first feeding instant.
    pub fn set_schedule_at(&mut self, next: NaiveDateTime, interval: IntervalKind) {
        self.scheduler.set_schedule(next, interval);
        self.schedule_updated(next, interval);
    }

    fn schedule_updated(&self, next: NaiveDateTime, interval: IntervalKind) {
        self.log_message(
            format!(
                "Feeding schedule updated: {} ({interval})",
                next.format("%Y-%m-%d %H:%M")
            ),
            Severity::Feed,
        );
        publish(&self.events, ConsoleEvent::Schedule(self.scheduler.schedule()));
    }

    pub fn get_schedule(&self) -> Schedule {
        self.scheduler.schedule()
    }

    pub fn clear_schedule(&mut self) {
        self.scheduler.clear();
        self.log_message("Feeding schedule cleared", Severity::Warning);
        publish(&self.events, ConsoleEvent::Schedule(self.scheduler.schedule()));
    }

    // ── tick ────────────────────────────────────────────────────────────────

    pub fn tick(&mut self) {
        self.serve_requests();
        self.evaluate_schedule();
        self.poll();
    }

    pub(crate) fn serve_requests(&mut self) {
        while let Ok(req) = self.req_rx.try_recv() {
            self.serve(req);
        }
    }

    pub(crate) fn serve(&mut self, req: Request) {
        // A requester that stopped waiting is not an error.
        match req {
            Request::SetSchedule {
                time,
                interval,
                reply,
            } => {
                let next = self.set_schedule(time, interval);
                let _ = reply.send(next);
            }
            Request::GetSchedule(reply) => {
                let _ = reply.send(self.get_schedule());
            }
            Request::ClearSchedule => self.clear_schedule(),
            Request::IsConnected(reply) => {
                let _ = reply.send(self.is_connected());
            }
            Request::SendCommand(cmd, reply) => {
                let sent = self.send_command(&cmd);
                let _ = reply.send(sent);
            }
            Request::Connect(reply) => {
                let r = self.connect();
                let _ = reply.send(r);
            }
            Request::Disconnect(reply) => {
                let closed = self.disconnect();
                let _ = reply.send(closed);
            }
        }
    }

    fn evaluate_schedule(&mut self) {
        match self.scheduler.evaluate(self.clock.now_local()) {
            Evaluation::Idle => {}
            Evaluation::TimeRemaining { remaining, urgency } => publish(
                &self.events,
                ConsoleEvent::Countdown {
                    text: Countdown(remaining).to_string(),
                    urgency,
                },
            ),
            Evaluation::DueNow(due) => {
                if due.should_feed() {
                    self.log_message("Scheduled feeding time reached!", Severity::Success);
                    let feed = Command::feed(i64::from(self.cfg.feed_seconds));
                    if !self.link.send(&feed) {
                        self.log_message(
                            format!("Scheduled feeding not delivered: {feed} could not be sent"),
                            Severity::Error,
                        );
                        self.publish_if_dropped();
                    }
                } else {
                    self.log_message(
                        format!(
                            "Missed feeding at {} skipped; next feeding {}",
                            due.scheduled.format("%Y-%m-%d %H:%M"),
                            due.next.format("%Y-%m-%d %H:%M")
                        ),
                        Severity::Info,
                    );
                }
                publish(&self.events, ConsoleEvent::Schedule(self.scheduler.schedule()));
            }
        }
    }

    /// Read and route whatever the board has sent, without evaluating the
    /// schedule.
    pub fn poll(&mut self) {
        match self.link.drain() {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => {
                for line in self.lines.push(&bytes) {
                    self.handle_line(&line);
                }
            }
            Err(e) => {
                self.lines.clear();
                self.log_message(format!("Error reading board data: {e}"), Severity::Error);
                publish(&self.events, ConsoleEvent::Connection(ConnectionState::Disconnected));
            }
        }
    }

    /// Route one inbound line. Public so replayed captures can be fed in.
    pub fn handle_line(&mut self, line: &str) {
        let t = classify(line);
        let message = format!("Board: {}", t.line);

        match &t.kind {
            TelemetryKind::WeightReading(grams) => {
                let grams = *grams;
                publish(
                    &self.events,
                    ConsoleEvent::Weight {
                        grams,
                        level: WeightLevel::of(grams),
                    },
                );
                let sample = WeightSample {
                    grams,
                    at: self.clock.now(),
                };
                if let Some(ev) = self.weight.observe(sample) {
                    let severity = match ev {
                        WeightEvent::Dispensed { .. } => Severity::Feed,
                        WeightEvent::Consumed { .. } => Severity::Weight,
                        WeightEvent::Stable { .. } => Severity::Muted,
                    };
                    self.log_message(ev.to_string(), severity);
                }
            }
            TelemetryKind::FoodLevel(level) | TelemetryKind::Distance { level, .. } => {
                self.food_level(*level);
            }
            TelemetryKind::ParseError(e) => {
                tracing::debug!(error = %e, "unparseable telemetry");
                self.log_message(format!("Error parsing {} data: {}", e.field, e.line), Severity::Error);
                return;
            }
            _ => {}
        }

        match t.throttle_key() {
            Some(key) => {
                self.log.enqueue_throttled(message, t.severity, key);
            }
            None => {
                self.log_message(message, t.severity);
            }
        }
    }

    fn food_level(&mut self, level: FoodLevel) {
        if let Some(changed) = self.food.observe(level) {
            publish(&self.events, ConsoleEvent::FoodLevel(changed));
            match changed {
                FoodLevel::Available => self.log_message("Food level: available", Severity::Success),
                FoodLevel::Low => self.log_message("Food level: storage low", Severity::Warning),
            };
        }
    }

    // ── diagnostics ─────────────────────────────────────────────────────────

    fn timed_send(&mut self, command: &Command, stats: &mut CommandStats) -> Option<Duration> {
        let start = self.clock.now();
        if self.link.send(command) {
            let took = self.clock.now().saturating_duration_since(start);
            stats.record_success(took);
            Some(took)
        } else {
            stats.record_failure();
            None
        }
    }

    /// Manual dispense for `seconds` (clamped to 1..=30).
    pub fn dispense(&mut self, seconds: i64) -> CommandStats {
        let mut stats = CommandStats::new();
        let cmd = Command::dispense(seconds);
        if !self.link.is_connected() {
            stats.record_failure();
            self.log_message("Dispense refused: board is not connected", Severity::Error);
            return stats;
        }
        match self.timed_send(&cmd, &mut stats) {
            Some(took) => {
                self.log_message(
                    format!("Command sent in {:.0}ms", took.as_secs_f64() * 1000.0),
                    Severity::Feed,
                );
                self.log_message(format!("Manual dispense started: {cmd}"), Severity::Feed);
            }
            None => {
                self.log_message(format!("Failed to send {cmd}"), Severity::Error);
                self.publish_if_dropped();
            }
        }
        stats
    }

    /// Toggle the LED and time both writes.
    pub fn led_test(&mut self) -> CommandStats {
        let mut stats = CommandStats::new();
        self.log_message("Testing LED toggle response times...", Severity::Feed);
        for cmd in [Command::LedOn, Command::LedOff] {
            match self.timed_send(&cmd, &mut stats) {
                Some(took) => self.log_message(
                    format!("{cmd} response: {:.0}ms", took.as_secs_f64() * 1000.0),
                    Severity::Success,
                ),
                None => self.log_message(format!("{cmd} failed to send"), Severity::Error),
            };
        }
        if let Some(avg) = stats.avg_ms() {
            self.log_message(format!("Average LED response time: {avg:.1}ms"), Severity::Weight);
        }
        stats
    }

    /// Cycle the stress command set `rounds` times, pausing between commands
    /// and rounds. Blocks the caller; never called from `tick`.
    pub fn stress_test(&mut self, rounds: u32) -> CommandStats {
        let mut stats = CommandStats::new();
        let rounds = rounds.max(1);
        self.log_message("Starting board stress test...", Severity::Feed);
        for round in 1..=rounds {
            self.log_message(format!("Round {round}/{rounds}"), Severity::Feed);
            for cmd in Command::STRESS_SET {
                match self.timed_send(&cmd, &mut stats) {
                    Some(took) => self.log_message(
                        format!("{cmd}: {:.0}ms", took.as_secs_f64() * 1000.0),
                        Severity::Success,
                    ),
                    None => self.log_message(format!("{cmd}: Failed"), Severity::Error),
                };
                self.clock.sleep(STRESS_COMMAND_GAP);
            }
            if round < rounds {
                self.clock.sleep(STRESS_ROUND_GAP);
            }
        }
        let severity = if stats.succeeded > 0 {
            Severity::Weight
        } else {
            Severity::Error
        };
        self.log_message(format!("Stress test results: {stats}"), severity);
        self.publish_if_dropped();
        stats
    }
}
