//! In-memory stand-in for the feeder's microcontroller.
//!
//! Answers the same ASCII command surface as the firmware and keeps enough
//! state (weight, distance, LED) for the console to exercise its telemetry
//! path end to end. A cloned [`SimHandle`] lets tests inject lines, inspect
//! what was written, and simulate a silent or unplugged board.

use crate::error::HwError;
use crate::util::take_line;
use feeder_traits::{Connector, Transport};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug)]
struct SimState {
    // Bytes waiting to be read by the host
    rx: Vec<u8>,
    written: Vec<String>,
    answer_ping: bool,
    // Printed ahead of PONG, like a boot banner
    ping_preamble: Vec<String>,
    unplugged: bool,
    busy: bool,
    weight_g: f64,
    distance_cm: f64,
    led_on: bool,
}

/// Shared control surface over a simulated board.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                rx: Vec::new(),
                written: Vec::new(),
                answer_ping: true,
                ping_preamble: Vec::new(),
                unplugged: false,
                busy: false,
                weight_g: 120.0,
                distance_cm: 6.0,
                led_on: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queue a line as if the board had printed it.
    pub fn push_line(&self, line: &str) {
        let mut s = self.lock();
        s.rx.extend_from_slice(line.as_bytes());
        s.rx.push(b'\n');
    }

    /// Queue raw bytes (no terminator added).
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().rx.extend_from_slice(bytes);
    }

    /// Lines the host has written so far.
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// When false the board stays silent on PING.
    pub fn set_answer_ping(&self, on: bool) {
        self.lock().answer_ping = on;
    }

    /// Lines the board prints before answering each PING.
    pub fn set_ping_preamble(&self, lines: Vec<String>) {
        self.lock().ping_preamble = lines;
    }

    /// Every subsequent read/write fails as if the cable was pulled.
    pub fn unplug(&self) {
        self.lock().unplugged = true;
    }

    /// Opening fails as if another process held the port.
    pub fn set_busy(&self, on: bool) {
        self.lock().busy = on;
    }

    pub fn set_weight(&self, grams: f64) {
        self.lock().weight_g = grams;
    }

    pub fn set_distance(&self, cm: f64) {
        self.lock().distance_cm = cm;
    }

    pub fn led_on(&self) -> bool {
        self.lock().led_on
    }
}

impl SimState {
    fn reply(&mut self, line: &str) {
        self.rx.extend_from_slice(line.as_bytes());
        self.rx.extend_from_slice(b"\r\n");
    }

    fn respond(&mut self, cmd: &str) {
        let cmd = cmd.trim().to_ascii_uppercase();
        if let Some(n) = cmd.strip_prefix("FEED_") {
            let secs: u32 = n.parse().unwrap_or(0);
            self.reply(&format!("Feeding for {secs} seconds"));
            self.weight_g += f64::from(secs) * 4.0;
            self.reply("Feed complete");
            return;
        }
        if let Some(n) = cmd.strip_prefix("DISPENSE_") {
            let secs: u32 = n.parse().unwrap_or(0);
            self.reply(&format!("Dispensing for {secs} seconds"));
            self.weight_g += f64::from(secs) * 4.0;
            self.reply("Dispense complete");
            return;
        }
        match cmd.as_str() {
            "PING" => {
                let preamble = self.ping_preamble.clone();
                for line in &preamble {
                    self.reply(line);
                }
                if self.answer_ping {
                    self.reply("PONG");
                }
            }
            "LED_ON" => {
                self.led_on = true;
                self.reply("LED ON");
            }
            "LED_OFF" => {
                self.led_on = false;
                self.reply("LED OFF");
            }
            "STATUS" => {
                self.reply("Status: OK");
                let w = self.weight_g;
                self.reply(&format!("Weight: {w:.1}g"));
            }
            "WEIGHT" => {
                let w = self.weight_g;
                self.reply(&format!("Weight: {w:.1}g"));
            }
            "TARE" => {
                self.weight_g = 0.0;
                self.reply("Tare complete");
            }
            "CAL" => self.reply("Calibration complete"),
            "DISTANCE" => {
                let d = self.distance_cm;
                self.reply(&format!("Distance: {d:.1} cm"));
            }
            "ULTRA_TEST" => {
                let d = self.distance_cm;
                self.reply(&format!("Distance: {d:.1} cm"));
            }
            "ULTRA_STATS" => self.reply("Ultrasonic stats: 0 timeouts"),
            "ULTRA_RESET" => self.reply("Ultrasonic stats reset"),
            other => self.reply(&format!("Error: unknown command {other}")),
        }
    }
}

/// Enumerates a fixed set of simulated port names, all backed by one board.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    ports: Vec<String>,
    handle: SimHandle,
}

impl SimulatedConnector {
    pub fn new(ports: Vec<String>) -> Self {
        Self::with_handle(ports, SimHandle::new())
    }

    pub fn with_handle(ports: Vec<String>, handle: SimHandle) -> Self {
        Self { ports, handle }
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl Connector for SimulatedConnector {
    type Port = SimulatedPort;

    fn available_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.ports.clone())
    }

    fn open(
        &self,
        name: &str,
        baud: u32,
    ) -> Result<SimulatedPort, Box<dyn std::error::Error + Send + Sync>> {
        if !self.ports.iter().any(|p| p == name) {
            return Err(Box::new(HwError::NoDevice(name.to_string())));
        }
        if self.handle.lock().busy {
            return Err(Box::new(HwError::AccessDenied(format!(
                "{name} is in use by another process"
            ))));
        }
        tracing::debug!(port = name, baud, "simulated port opened");
        Ok(SimulatedPort {
            handle: self.handle.clone(),
        })
    }
}

/// Host side of the simulated serial line.
#[derive(Debug)]
pub struct SimulatedPort {
    handle: SimHandle,
}

impl Transport for SimulatedPort {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.handle.lock();
        if s.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        s.written.push(line.to_string());
        s.respond(line);
        Ok(())
    }

    fn read_line(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        // Replies are produced synchronously on write, so waiting would never
        // yield anything new.
        let mut s = self.handle.lock();
        if s.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        Ok(take_line(&mut s.rx))
    }

    fn read_available(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.handle.lock();
        if s.unplugged {
            return Err(Box::new(HwError::Disconnected));
        }
        Ok(std::mem::take(&mut s.rx))
    }

    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handle.lock().rx.clear();
        Ok(())
    }
}
