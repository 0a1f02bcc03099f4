//! Serial link to the feeder board: connect/handshake, best-effort sends and
//! non-blocking drains.
//!
//! The link is the only owner of the open port. Any write or read failure
//! tears it down to `Disconnected`; callers see `false` or `ConnError::Io` and
//! decide whether to reconnect.

use crate::command::Command;
use crate::config::LinkCfg;
use crate::error::ConnError;
use crate::hw_error::map_hw_error;
use feeder_traits::{Clock, Connector, Transport};

/// Upper bound on unrelated lines read while waiting for PONG, per attempt.
pub const HANDSHAKE_MAX_LINES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Open and writable but the board never answered PING.
    Degraded,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }
}

pub struct SerialLink<C: Connector, K: Clock> {
    connector: C,
    clock: K,
    cfg: LinkCfg,
    port: Option<C::Port>,
    port_name: Option<String>,
    state: ConnectionState,
}

impl<C: Connector, K: Clock> SerialLink<C, K> {
    pub fn new(connector: C, clock: K, cfg: LinkCfg) -> Self {
        Self {
            connector,
            clock,
            cfg,
            port: None,
            port_name: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_open()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Ports the OS currently enumerates.
    pub fn available_ports(&self) -> Result<Vec<String>, ConnError> {
        self.connector
            .available_ports()
            .map_err(|e| map_hw_error(&*e))
    }

    /// Open `port`, let the board settle, then verify it with PING/PONG.
    ///
    /// Returns `Connected` on an exact PONG and `Degraded` when every attempt
    /// stays silent. An already-open link is left untouched and its current
    /// state returned.
    pub fn connect(&mut self, port: &str, baud: u32) -> Result<ConnectionState, ConnError> {
        if self.port.is_some() {
            tracing::debug!(port = ?self.port_name, "connect on open link ignored");
            return Ok(self.state);
        }
        self.state = ConnectionState::Connecting;
        let result = self.open_and_handshake(port, baud);
        match &result {
            Ok(state) => self.state = *state,
            Err(e) => {
                tracing::warn!(port, error = %e, "connect failed");
                self.state = ConnectionState::Disconnected;
            }
        }
        result
    }

    fn open_and_handshake(&mut self, port: &str, baud: u32) -> Result<ConnectionState, ConnError> {
        let available = self.available_ports()?;
        if !available.iter().any(|p| p == port) {
            return Err(ConnError::PortNotFound {
                port: port.to_string(),
                available,
            });
        }

        let mut dev = self
            .connector
            .open(port, baud)
            .map_err(|e| map_hw_error(&*e))?;
        tracing::info!(port, baud, "port opened; waiting for board to settle");
        self.clock.sleep(self.cfg.settle);

        // On error `dev` is dropped here, which closes the port.
        let answered = self.handshake(&mut dev)?;
        self.port = Some(dev);
        self.port_name = Some(port.to_string());

        if answered {
            tracing::info!(port, "handshake ok");
            Ok(ConnectionState::Connected)
        } else {
            tracing::warn!(port, "no PONG after retry; link degraded");
            Ok(ConnectionState::Degraded)
        }
    }

    fn handshake(&self, dev: &mut C::Port) -> Result<bool, ConnError> {
        let io = |e: Box<dyn std::error::Error + Send + Sync>| ConnError::HandshakeError(e.to_string());
        dev.clear_input().map_err(io)?;

        let attempts = 1 + u32::from(self.cfg.handshake_retries);
        for attempt in 1..=attempts {
            dev.write_line("PING").map_err(io)?;
            tracing::debug!(attempt, "PING sent");
            let deadline = self.clock.now() + self.cfg.handshake_timeout;
            for _ in 0..HANDSHAKE_MAX_LINES {
                let left = deadline.saturating_duration_since(self.clock.now());
                if left.is_zero() {
                    break;
                }
                match dev.read_line(left).map_err(io)? {
                    Some(line) if line.trim() == "PONG" => return Ok(true),
                    Some(line) => tracing::debug!(%line, "ignoring line during handshake"),
                    None => break,
                }
            }
        }
        Ok(false)
    }

    /// Best effort. `false` when there is no open link or the write failed;
    /// a failed write tears the link down.
    pub fn send(&mut self, command: &Command) -> bool {
        self.send_raw(&command.to_string())
    }

    pub fn send_raw(&mut self, line: &str) -> bool {
        let Some(dev) = self.port.as_mut() else {
            return false;
        };
        match dev.write_line(line) {
            Ok(()) => {
                tracing::debug!(%line, "sent");
                true
            }
            Err(e) => {
                tracing::warn!(%line, error = %e, "write failed; closing link");
                self.teardown();
                false
            }
        }
    }

    /// Whatever bytes are already buffered. Never blocks; empty when closed.
    /// Decoding is left to [`LineBuffer`] so a character split across two
    /// reads survives.
    pub fn drain(&mut self) -> Result<Vec<u8>, ConnError> {
        let Some(dev) = self.port.as_mut() else {
            return Ok(Vec::new());
        };
        match dev.read_available() {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                let msg = e.to_string();
                tracing::warn!(error = %msg, "read failed; closing link");
                self.teardown();
                Err(ConnError::Io(msg))
            }
        }
    }

    /// Idempotent. Returns whether a port was actually closed.
    pub fn disconnect(&mut self) -> bool {
        let closed = self.port.is_some();
        if closed {
            tracing::info!(port = ?self.port_name, "disconnected");
        }
        self.teardown();
        closed
    }

    fn teardown(&mut self) {
        self.port = None;
        self.state = ConnectionState::Disconnected;
    }
}

/// Reassembles lines from drained chunks. A line split across two drains is
/// held back until its terminator arrives; only complete lines are decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    tail: Vec<u8>,
}

// A board spewing bytes without terminators must not grow the tail forever.
const MAX_TAIL: usize = 4096;

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the complete, trimmed, non-blank lines.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.tail.extend_from_slice(chunk);
        let Some(cut) = self.tail.iter().rposition(|&b| b == b'\r' || b == b'\n') else {
            if self.tail.len() > MAX_TAIL {
                return self.take_tail().into_iter().collect();
            }
            return Vec::new();
        };
        let rest = self.tail.split_off(cut + 1);
        let complete = std::mem::replace(&mut self.tail, rest);
        complete
            .split(|&b| b == b'\r' || b == b'\n')
            .filter_map(decode_line)
            .collect()
    }

    /// Return the unterminated remainder, if any.
    pub fn take_tail(&mut self) -> Option<String> {
        decode_line(&std::mem::take(&mut self.tail))
    }

    pub fn clear(&mut self) {
        self.tail.clear();
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let t = text.trim();
    (!t.is_empty()).then(|| t.to_string())
}
