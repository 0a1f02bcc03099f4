pub mod clock;

pub use clock::{Clock, LocalClock, MonotonicClock, SystemClock, WallClock};
#[cfg(any(test, feature = "test-util"))]
pub use clock::test_clock;

use std::time::Duration;

/// An open, line-oriented serial device.
///
/// Lines are ASCII and newline-terminated on the wire; implementations strip
/// the terminator on read and append it on write.
pub trait Transport: Send {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Block for at most `timeout` waiting for one complete line.
    /// Returns `Ok(None)` when nothing arrived in time.
    fn read_line(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>;

    /// Return whatever bytes are already buffered without blocking.
    fn read_available(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;

    /// Discard any pending input.
    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Enumerates and opens serial devices.
pub trait Connector {
    type Port: Transport;

    fn available_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>>;

    fn open(
        &self,
        name: &str,
        baud: u32,
    ) -> Result<Self::Port, Box<dyn std::error::Error + Send + Sync>>;
}
