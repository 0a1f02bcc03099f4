//! Serial device backends for the feeder console.
//!
//! - `sim`: simulated board, always available (tests, `--sim`, builds without hardware)
//! - `serial`: OS serial ports via the `serialport` crate (`hardware` feature)
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub use serial::{HardwarePort, SerialPortConnector};
pub use sim::{SimHandle, SimulatedConnector, SimulatedPort};

#[cfg(test)]
mod tests {
    use super::*;
    use feeder_traits::{Connector, Transport};
    use std::time::Duration;

    fn open() -> (SimulatedPort, SimHandle) {
        let conn = SimulatedConnector::new(vec!["SIM0".to_string()]);
        let port = conn.open("SIM0", 9600).expect("open sim");
        (port, conn.handle())
    }

    #[test]
    fn ping_answers_pong() {
        let (mut port, _h) = open();
        port.write_line("PING").unwrap();
        let reply = port.read_line(Duration::from_millis(10)).unwrap();
        assert_eq!(reply.as_deref(), Some("PONG"));
    }

    #[test]
    fn silent_board_does_not_answer() {
        let (mut port, h) = open();
        h.set_answer_ping(false);
        port.write_line("PING").unwrap();
        assert_eq!(port.read_line(Duration::from_millis(10)).unwrap(), None);
    }

    #[test]
    fn unknown_port_is_rejected() {
        let conn = SimulatedConnector::new(vec!["SIM0".to_string()]);
        let err = conn.open("COM9", 9600).expect_err("no such port");
        assert!(err.downcast_ref::<error::HwError>().is_some());
    }

    #[test]
    fn unplugged_board_fails_io() {
        let (mut port, h) = open();
        h.unplug();
        assert!(port.write_line("STATUS").is_err());
        assert!(port.read_available().is_err());
    }

    #[test]
    fn commands_update_board_state() {
        let (mut port, h) = open();
        port.write_line("LED_ON").unwrap();
        assert!(h.led_on());
        port.write_line("TARE").unwrap();
        port.write_line("WEIGHT").unwrap();
        let text = String::from_utf8(port.read_available().unwrap()).unwrap();
        assert!(text.contains("LED ON"));
        assert!(text.contains("Tare complete"));
        assert!(text.contains("Weight: 0.0g"));
        assert_eq!(h.written(), vec!["LED_ON", "TARE", "WEIGHT"]);
    }
}
