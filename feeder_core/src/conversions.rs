//! `From` implementations bridging `feeder_config` types to runtime config.

use crate::config::{LinkCfg, LogSinkCfg, SchedulerCfg, ThrottleCfg, Timing, WeightCfg};
use chrono::TimeDelta;
use std::time::Duration;

impl From<&feeder_config::Serial> for LinkCfg {
    fn from(c: &feeder_config::Serial) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            handshake_timeout: Duration::from_millis(c.handshake_timeout_ms),
            handshake_retries: c.handshake_retries,
        }
    }
}

impl From<&feeder_config::ScheduleCfg> for SchedulerCfg {
    fn from(c: &feeder_config::ScheduleCfg) -> Self {
        let secs = i64::try_from(c.recent_miss_s).unwrap_or(i64::MAX);
        Self {
            recent_miss: TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX),
        }
    }
}

impl From<&feeder_config::LogCfg> for LogSinkCfg {
    fn from(c: &feeder_config::LogCfg) -> Self {
        Self {
            max_lines: c.max_lines,
            trim_ratio: c.trim_ratio,
            batch_size: c.batch_size,
            queue_capacity: c.queue_capacity,
            min_flush_depth: c.min_flush_depth,
            min_flush_interval: Duration::from_millis(c.min_flush_interval_ms),
            near_full_ratio: c.near_full_ratio,
            status_interval: Duration::from_millis(c.status_interval_ms),
        }
    }
}

impl From<&feeder_config::Throttle> for ThrottleCfg {
    fn from(c: &feeder_config::Throttle) -> Self {
        Self {
            spacing: Duration::from_millis(c.spacing_ms),
            max_duplicate_suppress: c.max_duplicate_suppress,
        }
    }
}

impl From<&feeder_config::WeightCfg> for WeightCfg {
    fn from(c: &feeder_config::WeightCfg) -> Self {
        Self {
            change_threshold_g: c.change_threshold_g,
            stable_threshold_g: c.stable_threshold_g,
        }
    }
}

impl From<&feeder_config::Timing> for Timing {
    fn from(c: &feeder_config::Timing) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms),
            flush: Duration::from_millis(c.flush_ms),
        }
    }
}

impl From<&feeder_config::Config> for crate::config::ConsoleCfg {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            port: c.serial.port.clone(),
            baud: c.serial.baud,
            feed_seconds: c.schedule.feed_seconds,
            link: LinkCfg::from(&c.serial),
            scheduler: SchedulerCfg::from(&c.schedule),
            weight: WeightCfg::from(&c.weight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleCfg;

    #[test]
    fn defaults_agree_with_toml_defaults() {
        let toml = feeder_config::Config::default();
        let console = ConsoleCfg::from(&toml);
        assert_eq!(console.port, "COM3");
        assert_eq!(console.link.settle, LinkCfg::default().settle);
        assert_eq!(console.scheduler.recent_miss, TimeDelta::minutes(5));
        let log = LogSinkCfg::from(&toml.log);
        assert_eq!(log.trim_block(), LogSinkCfg::default().trim_block());
        assert_eq!(
            ThrottleCfg::from(&toml.throttle).spacing,
            Duration::from_secs(1)
        );
        assert_eq!(Timing::from(&toml.timing).flush, Duration::from_millis(50));
    }

    #[test]
    fn toml_trim_ratio_gives_exact_block() {
        let toml: feeder_config::Config =
            feeder_config::load_toml("[log]\nmax_lines = 1000\ntrim_ratio = 0.1\n").unwrap();
        assert_eq!(LogSinkCfg::from(&toml.log).trim_block(), 100);
    }
}
