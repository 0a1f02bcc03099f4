//! Runtime configuration for the console components.
//!
//! These are the structs the components are built from. They are separate
//! from the TOML schema in `feeder_config`; see `conversions` for the bridge.

use chrono::TimeDelta;
use std::time::Duration;

/// Serial link timing.
#[derive(Debug, Clone)]
pub struct LinkCfg {
    /// Board reset time after the port opens.
    pub settle: Duration,
    /// Wait for PONG per handshake attempt.
    pub handshake_timeout: Duration,
    /// Additional PING attempts after the first.
    pub handshake_retries: u8,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(1500),
            handshake_timeout: Duration::from_millis(1500),
            handshake_retries: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerCfg {
    /// A due feeding at most this late still fires.
    pub recent_miss: TimeDelta,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            recent_miss: TimeDelta::minutes(5),
        }
    }
}

/// Visible log and producer queue sizing.
#[derive(Debug, Clone)]
pub struct LogSinkCfg {
    pub max_lines: usize,
    /// Fraction of `max_lines` dropped per trim, 0.1..=0.2.
    pub trim_ratio: f64,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub min_flush_depth: usize,
    pub min_flush_interval: Duration,
    /// Depth, as a fraction of capacity, that overrides the skip rules.
    pub near_full_ratio: f64,
    pub status_interval: Duration,
}

impl Default for LogSinkCfg {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            trim_ratio: 0.1,
            batch_size: 20,
            queue_capacity: 512,
            min_flush_depth: 5,
            min_flush_interval: Duration::from_millis(200),
            near_full_ratio: 0.8,
            status_interval: Duration::from_millis(500),
        }
    }
}

impl LogSinkCfg {
    /// Lines removed per trim, never zero.
    pub fn trim_block(&self) -> usize {
        let ratio = self.trim_ratio.clamp(0.1, 0.2);
        ((self.max_lines as f64 * ratio).ceil() as usize).max(1)
    }

    /// Queue depth that forces a flush.
    pub fn near_full_depth(&self) -> usize {
        let depth = (self.queue_capacity as f64 * self.near_full_ratio).ceil() as usize;
        depth.clamp(1, self.queue_capacity.max(1))
    }
}

#[derive(Debug, Clone)]
pub struct ThrottleCfg {
    pub spacing: Duration,
    pub max_duplicate_suppress: u32,
}

impl Default for ThrottleCfg {
    fn default() -> Self {
        Self {
            spacing: Duration::from_secs(1),
            max_duplicate_suppress: 10,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeightCfg {
    pub change_threshold_g: f64,
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

/// Everything the `Console` needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ConsoleCfg {
    pub port: String,
    pub baud: u32,
    /// FEED_<n> argument for scheduled feedings.
    pub feed_seconds: u8,
    pub link: LinkCfg,
    pub scheduler: SchedulerCfg,
    pub weight: WeightCfg,
}

impl Default for ConsoleCfg {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud: 9600,
            feed_seconds: 5,
            link: LinkCfg::default(),
            scheduler: SchedulerCfg::default(),
            weight: WeightCfg::default(),
        }
    }
}

/// Driver periods.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub tick: Duration,
    pub flush: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            flush: Duration::from_millis(50),
        }
    }
}
