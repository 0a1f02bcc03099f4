//! `serialport`-backed connector for a real USB/UART board.

use crate::error::HwError;
use crate::util::take_line;
use feeder_traits::{Connector, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

// Granularity of blocking reads while waiting for a full line
const READ_SLICE: Duration = Duration::from_millis(50);

fn map_serial_error(port: &str, e: serialport::Error) -> HwError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => HwError::NoDevice(port.to_string()),
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied) => {
            HwError::AccessDenied(format!("{port}: {e}"))
        }
        serialport::ErrorKind::Io(kind) => HwError::Io(std::io::Error::new(kind, e.to_string())),
        _ => HwError::Serial(e.to_string()),
    }
}

fn map_io_error(e: std::io::Error) -> HwError {
    match e.kind() {
        ErrorKind::PermissionDenied => HwError::AccessDenied(e.to_string()),
        ErrorKind::BrokenPipe | ErrorKind::NotConnected | ErrorKind::UnexpectedEof => {
            HwError::Disconnected
        }
        _ => HwError::Io(e),
    }
}

/// Opens OS serial devices as 8-N-1, no flow control.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortConnector;

impl Connector for SerialPortConnector {
    type Port = HardwarePort;

    fn available_ports(&self) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> {
        let ports = serialport::available_ports().map_err(|e| map_serial_error("*", e))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(
        &self,
        name: &str,
        baud: u32,
    ) -> Result<HardwarePort, Box<dyn std::error::Error + Send + Sync>> {
        let port = serialport::new(name, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_SLICE)
            .open()
            .map_err(|e| map_serial_error(name, e))?;
        tracing::info!(port = name, baud, "serial port opened");
        Ok(HardwarePort {
            port,
            rx: Vec::new(),
        })
    }
}

/// An open OS serial device with a small line-assembly buffer.
pub struct HardwarePort {
    port: Box<dyn SerialPort>,
    rx: Vec<u8>,
}

impl HardwarePort {
    fn fill(&mut self) -> Result<usize, HwError> {
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => Err(HwError::Disconnected),
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(n)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(map_io_error(e)),
        }
    }
}

impl Transport for HardwarePort {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.port
            .write_all(line.as_bytes())
            .and_then(|()| self.port.write_all(b"\n"))
            .and_then(|()| self.port.flush())
            .map_err(map_io_error)?;
        Ok(())
    }

    fn read_line(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = take_line(&mut self.rx) {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            self.fill()?;
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| map_serial_error("port", e))?;
        if pending > 0 {
            let mut chunk = vec![0u8; pending as usize];
            let n = self.port.read(&mut chunk).map_err(map_io_error)?;
            self.rx.extend_from_slice(&chunk[..n]);
        }
        Ok(std::mem::take(&mut self.rx))
    }

    fn clear_input(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.rx.clear();
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| map_serial_error("port", e))?;
        Ok(())
    }
}
