//! Flush timer and console loop start, serve and shut down cleanly.

use feeder_core::mocks::MemoryScheduleStore;
use feeder_core::{
    Console, ConsoleCfg, FlushTimer, LogSink, LogSinkCfg, Severity, ThrottleCfg, events,
    run_console,
};
use feeder_hardware::SimulatedConnector;
use feeder_traits::SystemClock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[test]
fn flush_timer_drains_queue_and_joins_on_drop() {
    let (tx, rx) = events::channel();
    let sink = Arc::new(LogSink::new(LogSinkCfg::default(), SystemClock, SystemClock, tx));
    let producer = sink.producer();
    let timer = FlushTimer::spawn(sink.clone(), Duration::from_millis(5));

    for i in 0..30 {
        producer.enqueue(format!("line {i}"), Severity::Info);
    }
    std::thread::sleep(Duration::from_millis(100));
    drop(timer);

    assert_eq!(sink.depth(), 0);
    assert_eq!(sink.lines().len(), 30);
    let logged = rx
        .try_iter()
        .filter(|e| matches!(e, feeder_core::ConsoleEvent::Log(_)))
        .count();
    assert_eq!(logged, 30);
}

#[test]
fn many_timers_do_not_leak() {
    let (tx, _rx) = events::channel();
    let sink = Arc::new(LogSink::new(LogSinkCfg::default(), SystemClock, SystemClock, tx));
    for _ in 0..10 {
        let timer = FlushTimer::spawn(sink.clone(), Duration::from_millis(2));
        std::thread::sleep(Duration::from_millis(5));
        timer.stop();
    }
    // Only the test's own reference remains once every thread has joined.
    assert_eq!(Arc::strong_count(&sink), 1);
}

#[test]
fn run_console_serves_handles_and_disconnects_on_shutdown() {
    let (tx, _rx) = events::channel();
    let sink = Arc::new(LogSink::new(LogSinkCfg::default(), SystemClock, SystemClock, tx.clone()));
    let producer = sink.producer();
    let shutdown = Arc::new(AtomicBool::new(false));
    let (handle_tx, handle_rx) = crossbeam_channel::bounded(1);

    let stop = shutdown.clone();
    let worker = std::thread::spawn(move || {
        let connector = SimulatedConnector::new(vec!["COM3".to_string()]);
        let sim = connector.handle();
        let cfg = ConsoleCfg {
            link: feeder_core::LinkCfg {
                settle: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut console = Console::new(
            cfg,
            connector,
            MemoryScheduleStore::default(),
            SystemClock,
            producer,
            ThrottleCfg::default(),
            tx,
        );
        handle_tx.send(console.handle()).unwrap();
        let ticks = run_console(&mut console, Duration::from_millis(5), &stop);
        (ticks, console.is_connected(), sim.written())
    });

    let handle = handle_rx.recv().unwrap();
    assert_eq!(handle.connect().map(|r| r.is_ok()), Some(true));
    assert_eq!(handle.is_connected(), Some(true));
    assert_eq!(
        handle.send_command(feeder_core::Command::LedOn),
        Some(true)
    );
    std::thread::sleep(Duration::from_millis(30));
    shutdown.store(true, Ordering::Relaxed);

    let (ticks, connected, written) = worker.join().unwrap();
    assert!(ticks > 0);
    assert!(!connected);
    assert_eq!(written, vec!["PING", "LED_ON"]);
    // The console is gone; the handle says so instead of hanging.
    assert_eq!(handle.is_connected(), None);

    sink.flush_all();
    assert!(
        sink.lines()
            .iter()
            .any(|e| e.message == "Application closing, disconnecting board...")
    );
}
