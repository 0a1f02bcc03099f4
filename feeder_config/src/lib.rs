#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the feeder console.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section is optional; an empty file yields a working default setup
//!   (COM3 at 9600 baud, 1 s tick, 50 ms log flush).
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Serial {
    /// Device name as enumerated by the OS ("COM3", "/dev/ttyACM0", ...)
    pub port: String,
    pub baud: u32,
    /// Time given to the board to reset after the port opens
    pub settle_ms: u64,
    /// How long to wait for PONG per handshake attempt
    pub handshake_timeout_ms: u64,
    /// Extra PING attempts after the first one
    pub handshake_retries: u8,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud: 9600,
            settle_ms: 1500,
            handshake_timeout_ms: 1500,
            handshake_retries: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleCfg {
    /// Where the next-feeding instant and interval are persisted
    pub state_file: String,
    /// A due feeding older than this is skipped instead of fired
    pub recent_miss_s: u64,
    /// Duration passed to FEED_<n> when a scheduled feeding fires
    pub feed_seconds: u8,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            state_file: "feeder_schedule.toml".to_string(),
            recent_miss_s: 300,
            feed_seconds: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Driver tick: schedule evaluation and serial polling
    pub tick_ms: u64,
    /// Log flush timer period
    pub flush_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            flush_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogCfg {
    /// Visible log cap
    pub max_lines: usize,
    /// Fraction of the visible log dropped per trim (0.1..=0.2)
    pub trim_ratio: f64,
    /// Max entries appended per flush
    pub batch_size: usize,
    /// Producer queue capacity; overflow is dropped and counted
    pub queue_capacity: usize,
    /// Flush is skipped below this depth unless min_flush_interval_ms has elapsed
    pub min_flush_depth: usize,
    pub min_flush_interval_ms: u64,
    /// Depth (fraction of capacity) that forces a flush
    pub near_full_ratio: f64,
    /// Minimum spacing between "receiving data" status updates
    pub status_interval_ms: u64,
}

impl Default for LogCfg {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            trim_ratio: 0.1,
            batch_size: 20,
            queue_capacity: 512,
            min_flush_depth: 5,
            min_flush_interval_ms: 200,
            near_full_ratio: 0.8,
            status_interval_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Throttle {
    /// Minimum spacing between two entries of the same category
    pub spacing_ms: u64,
    /// Suppressed duplicates that force a summary entry
    pub max_duplicate_suppress: u32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            spacing_ms: 1000,
            max_duplicate_suppress: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WeightCfg {
    /// |delta| above this is a dispense/consumption event
    pub change_threshold_g: f64,
    /// |delta| below this counts as settled
    pub stable_threshold_g: f64,
}

impl Default for WeightCfg {
    fn default() -> Self {
        Self {
            change_threshold_g: 5.0,
            stable_threshold_g: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: Serial,
    pub schedule: ScheduleCfg,
    pub timing: Timing,
    pub log: LogCfg,
    pub throttle: Throttle,
    pub weight: WeightCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        if self.serial.handshake_timeout_ms == 0 {
            eyre::bail!("serial.handshake_timeout_ms must be >= 1");
        }
        if self.serial.settle_ms > 10_000 || self.serial.handshake_timeout_ms > 10_000 {
            eyre::bail!("serial settle/handshake timeouts are unreasonably large (>10s)");
        }

        // Schedule
        if self.schedule.state_file.trim().is_empty() {
            eyre::bail!("schedule.state_file must not be empty");
        }
        if !(1..=30).contains(&self.schedule.feed_seconds) {
            eyre::bail!("schedule.feed_seconds must be in [1, 30]");
        }
        if self.schedule.recent_miss_s > 24 * 60 * 60 {
            eyre::bail!("schedule.recent_miss_s is unreasonably large (>24h)");
        }

        // Timing
        if self.timing.tick_ms == 0 {
            eyre::bail!("timing.tick_ms must be >= 1");
        }
        if self.timing.flush_ms == 0 {
            eyre::bail!("timing.flush_ms must be >= 1");
        }
        if self.timing.flush_ms > self.timing.tick_ms {
            eyre::bail!("timing.flush_ms must not exceed timing.tick_ms");
        }

        // Log
        if self.log.max_lines < 10 {
            eyre::bail!("log.max_lines must be >= 10");
        }
        if !(0.1..=0.2).contains(&self.log.trim_ratio) {
            eyre::bail!("log.trim_ratio must be in [0.1, 0.2]");
        }
        if self.log.batch_size == 0 {
            eyre::bail!("log.batch_size must be >= 1");
        }
        if self.log.batch_size >= self.log.max_lines {
            eyre::bail!("log.batch_size must be smaller than log.max_lines");
        }
        if self.log.queue_capacity < self.log.batch_size {
            eyre::bail!("log.queue_capacity must be >= log.batch_size");
        }
        if !(self.log.near_full_ratio > 0.0 && self.log.near_full_ratio <= 1.0) {
            eyre::bail!("log.near_full_ratio must be in (0.0, 1.0]");
        }

        // Throttle
        if self.throttle.max_duplicate_suppress == 0 {
            eyre::bail!("throttle.max_duplicate_suppress must be >= 1");
        }

        // Weight
        if !(self.weight.stable_threshold_g > 0.0) {
            eyre::bail!("weight.stable_threshold_g must be > 0");
        }
        if self.weight.change_threshold_g < self.weight.stable_threshold_g {
            eyre::bail!("weight.change_threshold_g must be >= weight.stable_threshold_g");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
