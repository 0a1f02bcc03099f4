//! Command timing statistics for the diagnostics operations.
//!
//! Latencies are write latencies: the firmware protocol carries no request
//! identifiers, so a reply cannot be tied to the command that caused it.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandStats {
    pub attempted: usize,
    pub succeeded: usize,
    samples_ms: Vec<f64>,
}

impl CommandStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.attempted += 1;
        self.succeeded += 1;
        self.samples_ms.push(latency.as_secs_f64() * 1000.0);
    }

    pub fn record_failure(&mut self) {
        self.attempted += 1;
    }

    /// Percentage of attempted commands that were written.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.succeeded as f64 * 100.0 / self.attempted as f64
    }

    pub fn min_ms(&self) -> Option<f64> {
        self.samples_ms.iter().copied().reduce(f64::min)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.samples_ms.iter().copied().reduce(f64::max)
    }

    pub fn avg_ms(&self) -> Option<f64> {
        if self.samples_ms.is_empty() {
            return None;
        }
        Some(self.samples_ms.iter().sum::<f64>() / self.samples_ms.len() as f64)
    }

    /// Population standard deviation.
    pub fn stdev_ms(&self) -> Option<f64> {
        let avg = self.avg_ms()?;
        let var = self
            .samples_ms
            .iter()
            .map(|x| (x - avg).powi(2))
            .sum::<f64>()
            / self.samples_ms.len() as f64;
        Some(var.sqrt())
    }

    pub fn samples_ms(&self) -> &[f64] {
        &self.samples_ms
    }
}

impl fmt::Display for CommandStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} commands ok ({:.1}%)",
            self.succeeded,
            self.attempted,
            self.success_rate()
        )?;
        if let (Some(min), Some(avg), Some(max), Some(sd)) =
            (self.min_ms(), self.avg_ms(), self.max_ms(), self.stdev_ms())
        {
            write!(
                f,
                "; min {min:.1}ms, avg {avg:.1}ms, max {max:.1}ms, stdev {sd:.1}ms"
            )?;
        }
        Ok(())
    }
}
