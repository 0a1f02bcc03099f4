//! Periodic drivers: the log flush timer and the console tick loop.
//!
//! `FlushTimer` spawns exactly one thread, shut down and joined when the
//! timer is dropped, so no flush thread outlives its sink.
use crate::console::Console;
use crate::log_sink::LogSink;
use crate::schedule::ScheduleStore;
use crossbeam_channel as xch;
use feeder_traits::{Clock, Connector, WallClock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub struct FlushTimer {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl FlushTimer {
    pub fn spawn<K>(sink: Arc<LogSink<K>>, period: Duration) -> Self
    where
        K: Clock + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let ticker = xch::tick(period.max(Duration::from_millis(1)));

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                if ticker.recv().is_err() {
                    break;
                }
                // Busy means a flush is already running; the next tick retries.
                sink.flush();
            }
            let rest = sink.flush_all();
            tracing::trace!(rest, "flush timer exiting");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Stop and join. Same as dropping.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "flush thread panicked during shutdown");
        }
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        // At most one flush period plus one flush.
        self.shutdown_and_join();
    }
}

/// Tick `console` every `tick` until `shutdown` is raised, serving handle
/// requests as they arrive. Disconnects on exit. Returns the number of ticks.
pub fn run_console<C, S, K>(
    console: &mut Console<C, S, K>,
    tick: Duration,
    shutdown: &AtomicBool,
) -> u64
where
    C: Connector,
    S: ScheduleStore,
    K: Clock + WallClock + Clone,
{
    let ticker = xch::tick(tick.max(Duration::from_millis(1)));
    let requests = console.requests().clone();
    let mut ticks = 0u64;

    tracing::info!(tick_ms = tick.as_millis() as u64, "console loop started");
    while !shutdown.load(Ordering::Relaxed) {
        xch::select! {
            recv(ticker) -> _ => {
                console.tick();
                ticks += 1;
            }
            recv(requests) -> req => {
                if let Ok(req) = req {
                    console.serve(req);
                }
            }
        }
    }
    if console.is_connected() {
        console.log_message("Application closing, disconnecting board...", crate::Severity::Warning);
        console.disconnect();
    }
    tracing::info!(ticks, "console loop stopped");
    ticks
}
