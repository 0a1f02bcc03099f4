use feeder_core::{Command, ConnError, ConnectionState, LinkCfg, SerialLink};
use feeder_hardware::{SimHandle, SimulatedConnector};
use feeder_traits::Clock;
use feeder_traits::test_clock::TestClock;
use std::time::Duration;

fn link(ports: &[&str]) -> (SerialLink<SimulatedConnector, TestClock>, SimHandle, TestClock) {
    let connector = SimulatedConnector::new(ports.iter().map(|p| p.to_string()).collect());
    let handle = connector.handle();
    let clock = TestClock::new();
    (
        SerialLink::new(connector, clock.clone(), LinkCfg::default()),
        handle,
        clock,
    )
}

#[test]
fn pong_connects_after_settle_delay() {
    let (mut l, sim, clock) = link(&["COM3"]);
    let before = clock.now();
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Connected));
    let waited = clock.now() - before;
    assert!(waited >= Duration::from_millis(1500));
    assert_eq!(sim.written(), vec!["PING"]);
    assert!(l.is_connected());
    assert_eq!(l.port_name(), Some("COM3"));
}

#[test]
fn silent_board_degrades_after_one_retry_and_still_sends() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.set_answer_ping(false);
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Degraded));
    assert_eq!(sim.written(), vec!["PING", "PING"]);
    assert!(l.is_connected());
    assert!(l.send(&Command::Status));
    assert!(l.send_raw("LED_ON"));
}

#[test]
fn chatter_before_pong_is_ignored_up_to_a_limit() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.set_ping_preamble(vec!["boot v1.2".into(), "Sensor ready".into()]);
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Connected));

    // Forty lines of noise per PING: neither attempt reaches its PONG
    // within the per-attempt line budget.
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.set_ping_preamble((0..40).map(|i| format!("noise {i}")).collect());
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Degraded));
    assert_eq!(sim.written(), vec!["PING", "PING"]);
}

#[test]
fn missing_port_lists_available_ones() {
    let (mut l, _sim, _clock) = link(&["COM1", "COM4"]);
    assert_eq!(
        l.connect("COM3", 9600),
        Err(ConnError::PortNotFound {
            port: "COM3".into(),
            available: vec!["COM1".into(), "COM4".into()],
        })
    );
    assert_eq!(l.state(), ConnectionState::Disconnected);
    let err = l.connect("COM3", 9600).unwrap_err();
    assert!(err.to_string().contains("COM1, COM4"));

    let (mut none, _sim, _clock) = link(&[]);
    let err = none.connect("COM3", 9600).unwrap_err();
    assert!(err.to_string().contains("(none)"));
}

#[test]
fn busy_port_is_access_denied() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.set_busy(true);
    assert!(matches!(
        l.connect("COM3", 9600),
        Err(ConnError::AccessDenied(_))
    ));
    assert!(!l.is_connected());
}

#[test]
fn handshake_io_failure_closes_port() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.unplug();
    assert!(matches!(
        l.connect("COM3", 9600),
        Err(ConnError::HandshakeError(_))
    ));
    assert_eq!(l.state(), ConnectionState::Disconnected);
    assert!(!l.send(&Command::Ping));
}

#[test]
fn second_connect_returns_current_state() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    sim.set_answer_ping(false);
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Degraded));
    sim.set_answer_ping(true);
    assert_eq!(l.connect("COM3", 9600), Ok(ConnectionState::Degraded));
    assert_eq!(sim.written().len(), 2);
}

#[test]
fn unplug_tears_link_down_on_write_and_read() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    l.connect("COM3", 9600).unwrap();
    sim.unplug();
    assert!(!l.send(&Command::Weight));
    assert_eq!(l.state(), ConnectionState::Disconnected);

    let (mut l, sim, _clock) = link(&["COM3"]);
    l.connect("COM3", 9600).unwrap();
    sim.unplug();
    assert!(matches!(l.drain(), Err(ConnError::Io(_))));
    assert_eq!(l.state(), ConnectionState::Disconnected);
    assert_eq!(l.drain(), Ok(Vec::new()));
}

#[test]
fn drain_returns_buffered_bytes_without_blocking() {
    let (mut l, sim, _clock) = link(&["COM3"]);
    assert_eq!(l.drain(), Ok(Vec::new()));
    l.connect("COM3", 9600).unwrap();
    assert!(l.send(&Command::feed(3)));
    let bytes = l.drain().unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("Feeding for 3 seconds\r\n"));
    assert!(text.contains("Feed complete"));
    assert_eq!(l.drain(), Ok(Vec::new()));
    sim.push_bytes(b"Weight: 1");
    assert_eq!(l.drain(), Ok(b"Weight: 1".to_vec()));
}

#[test]
fn disconnect_is_idempotent() {
    let (mut l, _sim, _clock) = link(&["COM3"]);
    assert!(!l.disconnect());
    l.connect("COM3", 9600).unwrap();
    assert!(l.disconnect());
    assert!(!l.disconnect());
    assert_eq!(l.state(), ConnectionState::Disconnected);
    assert!(!l.send(&Command::Ping));
}
