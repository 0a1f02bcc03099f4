//! Subcommand implementations on top of one `Console` session.

use crate::cli::{Commands, LAST_PORT, ScheduleAction};
use chrono::NaiveDateTime;
use eyre::{Result, WrapErr};
use feeder_core::events::{self, EventRx};
use feeder_core::hw_error::map_hw_error;
use feeder_core::{
    CommandStats, ConnectionState, Console, ConsoleCfg, ConsoleEvent, Countdown, FileScheduleStore,
    FlushTimer, LogSink, LogSinkCfg, Schedule, ThrottleCfg, Timing, Urgency, run_console,
};
use feeder_traits::{Connector, SystemClock, WallClock};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long one-shot commands wait for the board to answer before the
/// replies are collected.
const REPLY_WAIT: Duration = Duration::from_millis(200);

/// Console, log sink, flush timer and stdout printer wired together.
pub struct Session<C: Connector> {
    console: Console<C, FileScheduleStore, SystemClock>,
    sink: Arc<LogSink<SystemClock>>,
    flusher: FlushTimer,
    printer: JoinHandle<()>,
    timing: Timing,
    baud: u32,
}

impl<C: Connector> Session<C> {
    pub fn open(cfg: &feeder_config::Config, connector: C, json: bool) -> Self {
        let (tx, rx) = events::channel();
        let timing = Timing::from(&cfg.timing);
        let sink = Arc::new(LogSink::new(
            LogSinkCfg::from(&cfg.log),
            SystemClock,
            SystemClock,
            tx.clone(),
        ));
        let console = Console::new(
            ConsoleCfg::from(cfg),
            connector,
            FileScheduleStore::new(&cfg.schedule.state_file),
            SystemClock,
            sink.producer(),
            ThrottleCfg::from(&cfg.throttle),
            tx,
        );
        let flusher = FlushTimer::spawn(sink.clone(), timing.flush);
        let printer = spawn_printer(rx, json);
        Self {
            console,
            sink,
            flusher,
            printer,
            timing,
            baud: cfg.serial.baud,
        }
    }

    /// Drain the log and wait until every event has been printed.
    pub fn finish(self) {
        let Self {
            console,
            sink,
            flusher,
            printer,
            ..
        } = self;
        drop(console);
        flusher.stop();
        sink.flush_all();
        drop(sink);
        if printer.join().is_err() {
            tracing::warn!("event printer panicked");
        }
    }

    fn connect_or_fail(&mut self) -> Result<ConnectionState> {
        let state = self.console.connect()?;
        Ok(state)
    }

    fn collect_replies(&mut self) {
        std::thread::sleep(REPLY_WAIT);
        self.console.poll();
    }
}

/// Execute one subcommand. Commands that talk to the board connect first and
/// disconnect when done.
pub fn execute<C: Connector>(
    cmd: Commands,
    cfg: &feeder_config::Config,
    connector: C,
    json: bool,
) -> Result<()> {
    if let Commands::Ports = cmd {
        return list_ports(&connector, json);
    }

    let mut session = Session::open(cfg, connector, json);
    let _ = LAST_PORT.set(cfg.serial.port.clone());
    let result = dispatch(&mut session, cmd, json);
    if session.console.is_connected() {
        session.console.disconnect();
    }
    session.finish();
    result
}

fn dispatch<C: Connector>(session: &mut Session<C>, cmd: Commands, json: bool) -> Result<()> {
    match cmd {
        // Listed before a session is opened.
        Commands::Ports => Ok(()),
        Commands::Run { port, duration } => run(session, port, duration),
        Commands::SelfCheck => self_check(session, json),
        Commands::Schedule { action } => schedule(session, action, json),
        Commands::Send { command } => {
            session.connect_or_fail()?;
            if !session.console.send_command(&command) {
                eyre::bail!("{command} was not sent: board not connected");
            }
            session.collect_replies();
            Ok(())
        }
        Commands::Dispense { seconds } => {
            session.connect_or_fail()?;
            let stats = session.console.dispense(seconds);
            session.collect_replies();
            report_stats("dispense", &stats, json);
            require_success("dispense", &stats)
        }
        Commands::LedTest => {
            session.connect_or_fail()?;
            let stats = session.console.led_test();
            session.collect_replies();
            report_stats("led_test", &stats, json);
            require_success("LED test", &stats)
        }
        Commands::StressTest { rounds } => {
            session.connect_or_fail()?;
            let stats = session.console.stress_test(rounds);
            session.collect_replies();
            report_stats("stress_test", &stats, json);
            require_success("stress test", &stats)
        }
    }
}

fn require_success(what: &str, stats: &CommandStats) -> Result<()> {
    if stats.succeeded == 0 {
        eyre::bail!("{what} failed: board not connected");
    }
    Ok(())
}

fn list_ports<C: Connector>(connector: &C, json: bool) -> Result<()> {
    let ports = connector
        .available_ports()
        .map_err(|e| map_hw_error(&*e))
        .wrap_err("listing serial ports")?;
    if json {
        println!("{}", json!({ "ports": ports }));
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for p in &ports {
            println!("{p}");
        }
    }
    Ok(())
}

fn self_check<C: Connector>(session: &mut Session<C>, json: bool) -> Result<()> {
    let state = session.connect_or_fail()?;
    let port = session
        .console
        .link()
        .port_name()
        .unwrap_or_default()
        .to_string();
    if json {
        println!("{}", json!({ "self_check": format!("{state:?}"), "port": port }));
    }
    match state {
        ConnectionState::Connected => {
            if !json {
                println!("OK: board answered PONG on {port}");
            }
            Ok(())
        }
        _ => eyre::bail!("board on {port} did not answer PING; link is unverified"),
    }
}

fn schedule<C: Connector>(
    session: &mut Session<C>,
    action: ScheduleAction,
    json: bool,
) -> Result<()> {
    match action {
        ScheduleAction::Set(set) => {
            let next = session.console.set_schedule(set.at, set.interval);
            if json {
                println!("{}", schedule_json(&session.console.get_schedule(), SystemClock.now_local()));
            } else {
                println!("Next feeding: {} ({})", next.format("%Y-%m-%d %H:%M"), set.interval);
            }
        }
        ScheduleAction::Show => {
            let schedule = session.console.get_schedule();
            let now = SystemClock.now_local();
            if json {
                println!("{}", schedule_json(&schedule, now));
            } else {
                match schedule.next_feeding {
                    Some(next) => println!(
                        "Next feeding: {} ({}), in {}",
                        next.format("%Y-%m-%d %H:%M"),
                        schedule.interval,
                        Countdown(next - now)
                    ),
                    None => println!("No feeding scheduled"),
                }
            }
        }
        ScheduleAction::Clear => session.console.clear_schedule(),
    }
    Ok(())
}

fn schedule_json(schedule: &Schedule, now: NaiveDateTime) -> serde_json::Value {
    match schedule.next_feeding {
        Some(next) => json!({
            "next_feeding": next.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "interval": schedule.interval.label(),
            "countdown": Countdown(next - now).to_string(),
            "urgency": format!("{:?}", Urgency::from_remaining(next - now)),
        }),
        None => json!({ "next_feeding": null, "interval": schedule.interval.label() }),
    }
}

fn run<C: Connector>(session: &mut Session<C>, port: Option<String>, duration: u64) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!(error = %e, "Ctrl+C handler not installed");
    }
    if duration > 0 {
        let flag = shutdown.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(duration));
            flag.store(true, Ordering::Relaxed);
        });
    }

    // A failed connect is already in the log; the schedule keeps running.
    let connected = match port {
        Some(p) => {
            let baud = session.baud;
            session.console.connect_to(&p, baud)
        }
        None => session.console.connect(),
    };
    if let Err(e) = connected {
        tracing::warn!(error = %e, "starting without a board");
    }

    run_console(&mut session.console, session.timing.tick, &shutdown);
    Ok(())
}

/// JSON mode only; human output already has the summary in the log.
fn report_stats(kind: &str, stats: &CommandStats, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "stats": kind,
                "attempted": stats.attempted,
                "succeeded": stats.succeeded,
                "success_rate": stats.success_rate(),
                "min_ms": stats.min_ms(),
                "avg_ms": stats.avg_ms(),
                "max_ms": stats.max_ms(),
                "stdev_ms": stats.stdev_ms(),
            })
        );
    }
}

fn spawn_printer(rx: EventRx, json: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut last_urgency: Option<Urgency> = None;
        for event in rx {
            if json {
                if let Some(line) = event_json(&event) {
                    println!("{line}");
                }
                continue;
            }
            match event {
                ConsoleEvent::Log(entry) => println!("{entry}"),
                ConsoleEvent::Countdown { text, urgency } if last_urgency != Some(urgency) => {
                    last_urgency = Some(urgency);
                    println!("Next feeding in {text}");
                }
                _ => {}
            }
        }
    })
}

fn event_json(event: &ConsoleEvent) -> Option<serde_json::Value> {
    let v = match event {
        ConsoleEvent::Log(e) => json!({
            "event": "log",
            "time": e.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "severity": e.severity.as_str(),
            "message": e.message,
            "suppressed": e.suppressed,
        }),
        ConsoleEvent::Status(_) => return None,
        ConsoleEvent::Cleared => json!({ "event": "cleared" }),
        ConsoleEvent::Connection(s) => json!({ "event": "connection", "state": format!("{s:?}") }),
        ConsoleEvent::Countdown { text, urgency } => json!({
            "event": "countdown",
            "text": text,
            "urgency": format!("{urgency:?}"),
        }),
        ConsoleEvent::Weight { grams, level } => json!({
            "event": "weight",
            "grams": grams,
            "level": level.label(),
        }),
        ConsoleEvent::FoodLevel(l) => json!({ "event": "food_level", "level": format!("{l:?}") }),
        ConsoleEvent::Schedule(s) => json!({
            "event": "schedule",
            "next_feeding": s.next_feeding.map(|n| n.format("%Y-%m-%dT%H:%M:%S").to_string()),
            "interval": s.interval.label(),
        }),
    };
    Some(v)
}
