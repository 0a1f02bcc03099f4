//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand};
use feeder_core::{Command, IntervalKind};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();
/// Port the failing command was aimed at (for JSON error details).
pub static LAST_PORT: OnceLock<String> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Pet feeder operator console")]
pub struct Cli {
    /// Path to config TOML; a missing file means all defaults
    #[arg(long, value_name = "FILE", default_value = "feeder.toml")]
    pub config: PathBuf,

    /// Print events and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Diagnostic log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Talk to the simulated board even in hardware builds
    #[arg(long, action = ArgAction::SetTrue)]
    pub sim: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and run the console until Ctrl+C
    Run {
        /// Override the configured port
        #[arg(long, value_name = "PORT")]
        port: Option<String>,
        /// Stop after this many seconds (0 = until Ctrl+C)
        #[arg(long, value_name = "SECS", default_value_t = 0)]
        duration: u64,
    },
    /// List serial ports the board could be on
    Ports,
    /// Connect, handshake and disconnect
    SelfCheck,
    /// Inspect or change the persisted feeding schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Send one board command (PING, FEED_5, LED_ON, STATUS, ...)
    Send {
        #[arg(value_parser = parse_command)]
        command: Command,
    },
    /// Run the dispenser for a number of seconds (clamped to 1..=30)
    Dispense {
        #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
        seconds: i64,
    },
    /// Toggle the LED and report write latency
    LedTest,
    /// Cycle PING, LED_ON, LED_OFF, STATUS and report statistics
    StressTest {
        #[arg(long, default_value_t = 3)]
        rounds: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Set the daily time and recurrence
    Set(ScheduleSet),
    /// Show the next feeding and its countdown
    Show,
    /// Remove the schedule
    Clear,
}

#[derive(Args, Debug)]
pub struct ScheduleSet {
    /// Time of day, HH:MM (24h)
    #[arg(long, value_parser = parse_time_of_day)]
    pub at: chrono::NaiveTime,
    /// Recurrence: "Every Day", daily, 2h, 3h, 4h, 6h, 8h, 12h, twice, thrice
    #[arg(long, default_value = "Every Day", value_parser = parse_interval)]
    pub interval: IntervalKind,
}

fn parse_command(s: &str) -> Result<Command, String> {
    s.parse::<Command>().map_err(|e| e.to_string())
}

fn parse_interval(s: &str) -> Result<IntervalKind, String> {
    s.parse::<IntervalKind>().map_err(|e| e.to_string())
}

fn parse_time_of_day(s: &str) -> Result<chrono::NaiveTime, String> {
    chrono::NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| format!("expected HH:MM, got {s:?}"))
}
